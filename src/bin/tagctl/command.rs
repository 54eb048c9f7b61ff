use std::future::Future;

use serde::Serialize;
use serde_json::json;

use tagwatch::dto::check::{CheckAcceptedDto, DesiredStateDto, TimelineDto};

use crate::args::OutFormat;

pub async fn execute_command<Cmd, FutRes, Res>(out_format: OutFormat, command: Cmd)
where
    Cmd: FnOnce() -> FutRes,
    FutRes: Future<Output = anyhow::Result<Res>>,
    Res: Printable,
{
    match (command().await, out_format) {
        (Ok(result), fmt) => result.print(fmt),
        (Err(error), OutFormat::Plain) => eprintln!("Error during command execution - {error:#}"),
        (Err(error), OutFormat::Json) => eprintln!(
            "{}",
            json!({ "out": "error", "message": format!("{error:#}") })
        ),
    }
}

pub trait Printable {
    fn print(&self, format: OutFormat);
}

impl<T> Printable for T
where
    T: PrintFormat<JsonFormat> + PrintFormat<PlainFormat>,
{
    fn print(&self, format: OutFormat) {
        match format {
            OutFormat::Plain => PrintFormat::<PlainFormat>::print(self),
            OutFormat::Json => PrintFormat::<JsonFormat>::print(self),
        }
    }
}

pub struct JsonFormat;
pub struct PlainFormat;
pub trait PrintFormat<F> {
    fn print(&self);
}

impl<S> PrintFormat<JsonFormat> for S
where
    S: Serialize,
{
    fn print(&self) {
        match serde_json::to_string(self) {
            Ok(serialized) => println!("{serialized}"),
            Err(err) => eprintln!("Error serializing result in json format - {err}"),
        }
    }
}

#[derive(Serialize)]
pub struct ChangeNotified {
    pub name: String,
}

#[derive(Serialize)]
pub struct ResolvedVersion {
    pub source: String,
    pub repository: String,
    pub version: String,
}

impl PrintFormat<PlainFormat> for CheckAcceptedDto {
    fn print(&self) {
        println!("{:?} - {} checks enqueued", self.status, self.enqueued);
    }
}

impl PrintFormat<PlainFormat> for ChangeNotified {
    fn print(&self) {
        println!("Change of {} notified", self.name);
    }
}

impl PrintFormat<PlainFormat> for ResolvedVersion {
    fn print(&self) {
        println!("{}:{} (via {})", self.repository, self.version, self.source);
    }
}

impl PrintFormat<PlainFormat> for DesiredStateDto {
    fn print(&self) {
        println!(
            "{0: <16} | {1: <24} | {2: <48} | {3: <24} | {4: <33}",
            "NAMESPACE", "NAME", "REPOSITORY", "VERSION", "UPDATED"
        );
        println!(
            "{0: <16} | {1: <24} | {2: <48} | {3: <24} | {4: <33}",
            self.namespace, self.name, self.repository, self.version, self.updated_at
        );
    }
}

impl PrintFormat<PlainFormat> for TimelineDto {
    fn print(&self) {
        println!("{0: <64} | {1: <8} | {2: <33}", "IMAGE", "RESOLVED", "CREATED");
        for entry in &self.entries {
            println!("{0: <64} | {1: <8} | {2: <33}", entry.image, entry.resolved, entry.created_at);
        }
    }
}

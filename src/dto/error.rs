use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct ErrorDto {
    pub code: String,
    pub message: String,
}

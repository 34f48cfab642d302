pub mod http_client;
mod openai_compatible;

pub use http_client::{ByteStream, HttpClient, HttpClientTrait};
pub use openai_compatible::OpenAiCompatibleProvider;

pub mod gemini;
pub mod http;
pub mod local;
pub mod openai;
pub mod router;
pub mod traits;
pub mod types;

pub use router::{ProviderRouter, ResolvedModel};
pub use traits::ProviderClient;
pub use types::{ChatRequest, ProviderError};

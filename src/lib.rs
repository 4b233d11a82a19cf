//! Relays text prompts to image providers (Unsplash search first, StarryAI generation as
//! fallback) and returns their results in one normalized shape.

pub mod config;
mod error;
pub mod generate;
pub mod normalize;
pub mod providers;
pub mod types;
pub mod utils;

#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub mod telemetry;

pub use config::{Env, ProviderConfig, RelayConfig};
pub use error::{RelayError, Result};
pub use generate::Generator;
pub use normalize::{RawProviderResponse, normalize_error, normalize_success};
pub use providers::{ImageProvider, ProviderKind, RawProviderBody, StarryAi, Unsplash};
pub use types::{
    Credit, FailureKind, GenerationFailure, GenerationRequest, GenerationResponse,
    GenerationResult, Image,
};

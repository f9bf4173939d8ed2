//! Gateway Common Types
//!
//! Wire types shared by the inference gateway and the llama manager client.

pub mod completion;
pub mod generation;

pub use completion::{
    ChatMessage, CompletionChoice, CompletionRequest, CompletionResponse, LoadModelRequest,
    ModelData, ModelList,
};
pub use generation::{
    ErrorPayload, GenerationRequest, GenerationResponse, HealthState, HealthStatus,
    DEFAULT_MODEL_ALIAS, DEFAULT_STOP_SEQUENCES, MODEL_NOT_LOADED,
};

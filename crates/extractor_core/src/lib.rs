pub mod domain;
pub mod interpret;
pub mod ports;
pub mod progress;
pub mod prompt;
pub mod relay;
pub mod steps;

pub use domain::{
    Extraction, NewExtraction, StepAdvance, StreamEvent, User, UserCredentials, UserProgress,
};
pub use interpret::{interpret, Interpreted, ResultKind};
pub use ports::{
    ByteStream, ChatCompletionStream, ChatRequest, ExtractionStore, PortError, PortResult,
    ProgressStore, UserStore,
};
pub use prompt::{build_prompt, BuiltPrompt};
pub use relay::{relay, RelayError};
pub use steps::{StepDefinition, TERMINAL_STEP};

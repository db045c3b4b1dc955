//! Reasoning side channel for streamed model responses
//!
//! - [`extract_reasoning_text`] pulls reasoning text out of a single payload
//! - [`ReasoningTap`] wraps a stream function to report that text to an
//!   observer while leaving payload delivery untouched

pub mod extract;
pub mod tap;

pub use extract::{extract_reasoning_text, REASONING_FIELDS};
pub use tap::{ReasoningEvent, ReasoningObserver, ReasoningTap, TapOptions, TappedStreamFn};

//! These models represent the objects passed around by the orchestrator
//!
//! There are several related formats we need to interact with:
//! - streamed openai chunks, received from the LLM while it is still generating
//! - openai messages/tools, sent from the orchestrator to the LLM
//! - tool requests and results, exchanged with the tool registry
//! - text deltas and run markers, pushed to a stream sink
//!
//! We always immediately convert the wire formats into these internal structs using
//! to/from helpers in the providers module, so the rest of the crate only matches on
//! the tagged variants defined here.
pub mod conversation;
pub mod fragment;
pub mod message;
pub mod role;
pub mod tool;

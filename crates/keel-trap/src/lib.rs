#![cfg_attr(not(feature = "std"), no_std)]

pub mod context;
pub mod cpu;
pub mod diag;
pub mod dispatch;
pub mod error;
pub mod opal;
pub mod policy;
pub mod sleep;
pub mod trap;
pub mod vector;

pub use context::*;
pub use cpu::*;
pub use diag::{DiagBuffer, DiagSink, LogSink, EXCEPTION_MAX_STR};
pub use dispatch::{Dispatcher, Outcome};
pub use error::*;
pub use policy::{Report, Verdict};
pub use trap::*;
pub use vector::*;

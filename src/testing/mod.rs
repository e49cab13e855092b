//! Headless testing framework: Pilot, recording fakes, snapshot helpers.
//!
//! Use the [`Pilot`] to drive a [`Runtime`](crate::runtime::Runtime) wired to
//! [`FakeHttp`], [`RecordingNavigator`], in-memory stores and a manual
//! scheduler. Use [`store_to_string`] and [`component_to_string`] for
//! snapshot-style assertions.

pub mod fakes;
pub mod pilot;
pub mod snapshot;

pub use fakes::{FakeHttp, RecordedRequest, RecordingNavigator};
pub use pilot::Pilot;
pub use snapshot::{component_to_string, store_to_string};

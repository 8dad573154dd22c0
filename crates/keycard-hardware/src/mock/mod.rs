//! Mock hardware devices for testing and development.
//!
//! Every mock comes paired with a handle: the device goes to the code under
//! test, the handle stays with the test to drive or inspect it.

mod indicator;
mod presence;

pub use indicator::{IndicatorCall, MockIndicator, MockIndicatorHandle, MockLamps, MockLampsHandle};
pub use presence::{MockPresence, MockPresenceHandle, MockTagPoller, MockTagPollerHandle};

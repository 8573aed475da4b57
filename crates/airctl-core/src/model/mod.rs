// ── Domain model ──
//
// Wire types for the appliance gateway. Everything here serializes to the
// exact JSON the gateway expects and rejects values it would not accept.

pub mod control;
pub mod response;
pub mod schedule;

pub use control::{ControlCommand, FanSpeed, InvalidValue, Mode, Temperature};
pub use response::{ResponseStatus, SchedulerResponse, TriggerEvent};
pub use schedule::{DayOfWeek, RepeatRule, ScheduleItem};

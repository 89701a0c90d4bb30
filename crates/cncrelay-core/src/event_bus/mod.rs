//! # Event Bus Module
//!
//! Broadcast sink for state deltas and command results.
//!
//! Publishers emit typed events without knowing subscribers; subscribers
//! filter by category and receive events either through a synchronous handler
//! or an async broadcast receiver. There is no acknowledgment and no
//! backpressure: a publish never waits on an observer.
//!
//! ```rust,ignore
//! use cncrelay_core::event_bus::{AppEvent, EventBus, EventCategory, EventFilter, MachineEvent};
//!
//! let bus = EventBus::new();
//! let sub = bus.subscribe(EventFilter::Categories(vec![EventCategory::Machine]), |event| {
//!     tracing::info!("{}", event.description());
//! });
//! bus.publish(AppEvent::Machine(MachineEvent::ToolChangingChanged { changing: true })).ok();
//! bus.unsubscribe(sub);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;

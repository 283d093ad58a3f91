//! Built-in collaborators that give the watchdog something to watch when the
//! harness runs on its own: an interrupt-fed queue and two register integrity
//! activities.

pub mod int_queue;

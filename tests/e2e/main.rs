//! End-to-end scenarios driving a real store root through many short-lived
//! store handles.

mod harness;
mod scenarios;

//! Client-level tests: dispatcher, facade and subscription lifecycle.

mod behaviour;
mod support;

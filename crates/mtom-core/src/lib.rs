#![deny(warnings)]
pub mod belief;
pub mod culture;
pub mod negotiation;
pub mod observer;
pub mod perception;
pub mod social;
pub mod utility;

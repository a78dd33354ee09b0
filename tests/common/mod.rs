#![allow(dead_code)]

pub(crate) mod logging;

pub(crate) mod network;

pub(crate) mod node;

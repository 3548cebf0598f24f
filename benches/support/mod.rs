#![allow(dead_code)]

pub mod datasets;

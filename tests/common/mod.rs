#![allow(dead_code)]

pub mod wiremock_helpers;

pub mod communication;
pub mod config;
pub mod nmea;
pub mod relay;
pub mod report;
pub mod selftest;

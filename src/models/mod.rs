//! This module contains the data models for the Cirrus application.

pub mod alert;
pub mod city;
pub mod delivery;
pub mod notification;
pub mod settings;
pub mod weather;

pub use alert::{Alert, AlertSeverity, AlertType};
pub use city::TrackedCity;
pub use delivery::{DeliveryRecord, DeliveryStatus, NewDelivery};
pub use notification::NotificationMessage;
pub use settings::AlertSettings;
pub use weather::{Forecast, ForecastEntry, WeatherSnapshot};

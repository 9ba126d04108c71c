//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements                 | Connects to                 |
//! |----------------|----------------------------|-----------------------------|
//! | `hardware`     | SensorPort, ActuatorPort   | ESP32 ADC, GPIO, I²C        |
//! |                | ClockPort                  | (delegates to `time`)       |
//! | `log_sink`     | EventSink                  | Serial log output           |
//! | `mqtt`         | BrokerPort                 | ESP-MQTT client / in-memory |
//! | `text_display` | DisplayPort                | Row buffer, logged on flush |
//! | `time`         | ClockPort                  | ESP32 system timer, SNTP    |

pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod text_display;
pub mod time;

//! Port implementations for the ESP32 board.
//!
//! | Adapter    | Implements         | Connects to               |
//! |------------|--------------------|---------------------------|
//! | `hardware` | DigitalIo          | ESP32 GPIO                |
//! |            | SirenTimer         | esp_timer (one per side)  |
//! | `log_sink` | EventSink          | Serial log output         |
//! | `nvs`      | ConfigPort         | NVS / in-memory store     |
//! |            | StoragePort        |                           |
//! | `telegram` | MessageTransport   | Bot API over HTTPS        |
//! | `time`     | Clock              | ESP32 system timer        |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod telegram;
pub mod time;

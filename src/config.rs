//! Configuration management.
//!
//! Two kinds of configuration feed the relay:
//!
//! - [`sections`]: the INI device configuration describing channels and sample
//!   clock timing. Sections are selected by name prefix.
//! - [`settings`]: the runtime settings of the process itself (topic, log level,
//!   header mapping, driver and publisher backends), layered with `figment`.

pub mod sections;
pub mod settings;

pub use sections::{extract_sections, extract_sections_from_str, ConfigSection, SECTION_NAME_KEY};
pub use settings::{
    DriverBackend, MqttSettings, PublisherBackend, PublisherSettings, RelaySettings,
    SettingsOverrides,
};

//! Modules: capability-bound units of behaviour.
//!
//! Every module declares the capability it requires, contributes a request
//! fragment to the batched query, parses its slice of the response in a
//! post-update hook, and contributes features once the device has completed
//! its first update.
//!
//! Concrete modules are plain structs implementing [`Module`]. They are
//! wrapped in the [`SmartModule`] enum so a device can own a heterogeneous,
//! statically dispatched collection. Which modules exist is decided by the
//! explicit [`MODULE_DESCRIPTORS`] table handed to the loader.

mod brightness;
mod child_device;
mod child_setup;
mod cloud;
mod color;
mod color_temperature;
mod device_info;
mod energy;
mod fan;
mod firmware;
mod light;
mod time;

pub use brightness::Brightness;
pub use child_device::ChildDevice;
pub use child_setup::{ChildSetup, SUPPORTED_CATEGORIES_QUERY};
pub use cloud::Cloud;
pub use color::{Color, Hsv};
pub use color_temperature::ColorTemperature;
pub use device_info::DeviceModule;
pub use energy::Energy;
pub use fan::Fan;
pub use firmware::{Firmware, LatestFirmware};
pub use light::{Light, LightState};
pub use time::Time;

use std::fmt;
use std::future::Future;

use chrono::TimeDelta;
use serde::de::DeserializeOwned;
use serde_json::Value;

use smartlink_domain::capability::CapabilitySet;
use smartlink_domain::error::ErrorCode;
use smartlink_domain::info::DeviceInfo;
use smartlink_domain::message::{Request, Response, Responses};
use smartlink_domain::time::Timestamp;

use crate::features::Feature;

/// Read-only view of a device handed to module hooks and probes.
#[derive(Debug, Clone, Copy)]
pub struct ModuleContext<'a> {
    /// Current raw info record.
    pub info: &'a DeviceInfo,
    /// Last merged responses.
    pub responses: &'a Responses,
    /// Negotiated capabilities.
    pub capabilities: &'a CapabilitySet,
}

impl<'a> ModuleContext<'a> {
    /// Payload for a method; sentinels and absence are both errors.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Unavailable`] for a sentinel and
    /// [`ModuleError::MissingResponse`] when the method has no entry.
    pub fn payload(&self, method: &str) -> Result<&'a Value, ModuleError> {
        match self.responses.get(method) {
            Some(Response::Ok(value)) => Ok(value),
            Some(Response::Err(code)) => Err(ModuleError::Unavailable {
                method: method.to_owned(),
                code: *code,
            }),
            None => Err(ModuleError::MissingResponse(method.to_owned())),
        }
    }

    /// Deserialize the payload of a method.
    ///
    /// # Errors
    ///
    /// Same as [`payload`](Self::payload), plus [`ModuleError::Payload`] when
    /// the payload does not match `T`.
    pub fn parse<T: DeserializeOwned>(&self, method: &str) -> Result<T, ModuleError> {
        let value = self.payload(method)?;
        T::deserialize(value).map_err(|source| ModuleError::Payload {
            method: method.to_owned(),
            source,
        })
    }

    /// A field of the raw info record.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::MissingField`] when the field is absent.
    pub fn info_field(&self, field: &'static str) -> Result<&'a Value, ModuleError> {
        self.info.get(field).ok_or(ModuleError::MissingField(field))
    }

    /// An integer field of the raw info record.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::MissingField`] when the field is absent or not
    /// an integer.
    pub fn info_i64(&self, field: &'static str) -> Result<i64, ModuleError> {
        self.info_field(field)?
            .as_i64()
            .ok_or(ModuleError::MissingField(field))
    }
}

/// Failure reported by a module's post-update hook.
///
/// A module returning this is evicted from its device.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// The response map has no entry for the method.
    #[error("no response for {0}")]
    MissingResponse(String),

    /// The method came back as a sentinel error code.
    #[error("{method} unavailable: {code}")]
    Unavailable {
        /// Method that failed.
        method: String,
        /// Sentinel code.
        code: ErrorCode,
    },

    /// A required info field is absent.
    #[error("info field {0} missing")]
    MissingField(&'static str),

    /// A payload did not have the expected shape.
    #[error("malformed {method} payload")]
    Payload {
        /// Method whose payload was malformed.
        method: String,
        /// Decode failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Behaviour every module provides.
pub trait Module {
    /// Request fragment merged into the batch. Empty means "reads info only".
    fn query(&self) -> Request {
        Request::new()
    }

    /// Minimum time between two inclusions in a batch. Zero means always.
    fn minimum_update_interval(&self) -> TimeDelta {
        TimeDelta::zero()
    }

    /// Runtime support probe, run once right after instantiation.
    fn check_supported(&self, _ctx: &ModuleContext<'_>) -> impl Future<Output = bool> + Send {
        async { true }
    }

    /// Parse the latest responses into module state.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError`] when the module can no longer work with the
    /// data it gets; the orchestrator then evicts it.
    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError>;

    /// Features contributed to the owning device.
    fn features(&self) -> Vec<Feature> {
        Vec::new()
    }
}

macro_rules! define_modules {
    ($($(#[doc = $doc:expr])* $variant:ident($ty:ty) => $name:literal, $accessor:ident;)*) => {
        /// Identity of a module within a device.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ModuleKind {
            $($(#[doc = $doc])* $variant,)*
        }

        impl ModuleKind {
            /// Stable module name.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }

        /// A loaded module.
        #[derive(Debug, Clone)]
        pub enum SmartModule {
            $($(#[doc = $doc])* $variant($ty),)*
        }

        impl SmartModule {
            /// Identity of this module.
            #[must_use]
            pub fn kind(&self) -> ModuleKind {
                match self {
                    $(Self::$variant(_) => ModuleKind::$variant,)*
                }
            }

            /// See [`Module::query`].
            #[must_use]
            pub fn query(&self) -> Request {
                match self {
                    $(Self::$variant(m) => m.query(),)*
                }
            }

            /// See [`Module::minimum_update_interval`].
            #[must_use]
            pub fn minimum_update_interval(&self) -> TimeDelta {
                match self {
                    $(Self::$variant(m) => m.minimum_update_interval(),)*
                }
            }

            /// See [`Module::check_supported`].
            pub async fn check_supported(&self, ctx: &ModuleContext<'_>) -> bool {
                match self {
                    $(Self::$variant(m) => m.check_supported(ctx).await,)*
                }
            }

            /// See [`Module::post_update`].
            ///
            /// # Errors
            ///
            /// Propagates the module's [`ModuleError`].
            pub fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
                match self {
                    $(Self::$variant(m) => m.post_update(ctx),)*
                }
            }

            /// See [`Module::features`].
            #[must_use]
            pub fn features(&self) -> Vec<Feature> {
                match self {
                    $(Self::$variant(m) => m.features(),)*
                }
            }
        }

        impl ModuleSet {
            $(
                #[doc = concat!("The `", $name, "` module, if loaded.")]
                #[must_use]
                pub fn $accessor(&self) -> Option<&$ty> {
                    match self.get(ModuleKind::$variant)? {
                        SmartModule::$variant(m) => Some(m),
                        _ => None,
                    }
                }
            )*
        }
    };
}

define_modules! {
    /// Base device information.
    DeviceInfo(DeviceModule) => "DeviceModule", device_info;
    /// Child enumeration.
    ChildDevice(ChildDevice) => "ChildDevice", child_device;
    /// Cloud connection state.
    Cloud(Cloud) => "Cloud", cloud;
    /// Device clock.
    Time(Time) => "Time", time;
    /// Firmware update availability.
    Firmware(Firmware) => "Firmware", firmware;
    /// Energy metering.
    Energy(Energy) => "Energy", energy;
    /// Dimming.
    Brightness(Brightness) => "Brightness", brightness;
    /// Hue/saturation colour.
    Color(Color) => "Color", color;
    /// White colour temperature.
    ColorTemperature(ColorTemperature) => "ColorTemperature", color_temperature;
    /// Fan speed control.
    Fan(Fan) => "Fan", fan;
    /// Child pairing.
    ChildSetup(ChildSetup) => "ChildSetup", child_setup;
    /// Composite light aggregating the colour-related modules.
    Light(Light) => "Light", light;
}

impl ModuleKind {
    /// Modules whose data is already fetched by negotiation and which are
    /// therefore not queried again on the first update cycle.
    #[must_use]
    pub fn is_bootstrap(self) -> bool {
        matches!(self, Self::DeviceInfo | Self::ChildDevice | Self::Cloud)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of a module type, consumed by the loader.
#[derive(Debug, Clone, Copy)]
pub struct ModuleDescriptor {
    /// Module identity.
    pub kind: ModuleKind,
    /// Capability id the module requires.
    pub capability: &'static str,
    /// Only load on a true root; skipped on children of non-hub parents.
    pub root_only: bool,
    /// Info key that makes the module eligible even without the capability.
    pub parent_key: Option<&'static str>,
    /// Constructor.
    pub constructor: fn() -> SmartModule,
}

/// Every module the loader knows about, in batch order.
pub static MODULE_DESCRIPTORS: &[ModuleDescriptor] = &[
    ModuleDescriptor {
        kind: ModuleKind::DeviceInfo,
        capability: "device",
        root_only: true,
        parent_key: None,
        constructor: || SmartModule::DeviceInfo(DeviceModule::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::ChildDevice,
        capability: "child_device",
        root_only: false,
        parent_key: None,
        constructor: || SmartModule::ChildDevice(ChildDevice::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::Cloud,
        capability: "cloud_connect",
        root_only: true,
        parent_key: None,
        constructor: || SmartModule::Cloud(Cloud::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::Time,
        capability: "time",
        root_only: true,
        parent_key: None,
        constructor: || SmartModule::Time(Time::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::Firmware,
        capability: "firmware",
        root_only: true,
        parent_key: None,
        constructor: || SmartModule::Firmware(Firmware::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::Energy,
        capability: "energy_monitoring",
        root_only: false,
        parent_key: None,
        constructor: || SmartModule::Energy(Energy::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::Brightness,
        capability: "brightness",
        root_only: false,
        parent_key: None,
        constructor: || SmartModule::Brightness(Brightness::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::Color,
        capability: "color",
        root_only: false,
        parent_key: None,
        constructor: || SmartModule::Color(Color::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::ColorTemperature,
        capability: "color_temperature",
        root_only: false,
        parent_key: None,
        constructor: || SmartModule::ColorTemperature(ColorTemperature::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::Fan,
        capability: "fan_control",
        root_only: false,
        parent_key: Some("fan_speed_level"),
        constructor: || SmartModule::Fan(Fan::default()),
    },
    ModuleDescriptor {
        kind: ModuleKind::ChildSetup,
        capability: "child_quick_setup",
        root_only: false,
        parent_key: None,
        constructor: || SmartModule::ChildSetup(ChildSetup::default()),
    },
];

/// A module together with its update bookkeeping.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    module: SmartModule,
    last_update: Option<Timestamp>,
}

impl ModuleEntry {
    /// Identity of the wrapped module.
    #[must_use]
    pub fn kind(&self) -> ModuleKind {
        self.module.kind()
    }

    /// The wrapped module.
    #[must_use]
    pub fn module(&self) -> &SmartModule {
        &self.module
    }

    /// When the module was last included in a batch.
    #[must_use]
    pub fn last_update(&self) -> Option<Timestamp> {
        self.last_update
    }

    /// Whether the module is due for inclusion in a batch issued at `now`.
    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        let interval = self.module.minimum_update_interval();
        match self.last_update {
            _ if interval.is_zero() => true,
            None => true,
            Some(last) => now - last >= interval,
        }
    }

    pub(crate) fn mark_updated(&mut self, now: Timestamp) {
        self.last_update = Some(now);
    }

    pub(crate) fn module_mut(&mut self) -> &mut SmartModule {
        &mut self.module
    }
}

/// Modules active on one device, keyed by [`ModuleKind`], in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ModuleSet {
    entries: Vec<ModuleEntry>,
}

impl ModuleSet {
    /// Add a module, replacing any module of the same kind in place.
    pub fn insert(&mut self, module: SmartModule) {
        let kind = module.kind();
        let entry = ModuleEntry {
            module,
            last_update: None,
        };
        if let Some(slot) = self.entries.iter_mut().find(|e| e.kind() == kind) {
            *slot = entry;
        } else {
            self.entries.push(entry);
        }
    }

    /// Look up a module by kind.
    #[must_use]
    pub fn get(&self, kind: ModuleKind) -> Option<&SmartModule> {
        self.entry(kind).map(ModuleEntry::module)
    }

    /// Look up a module entry by kind.
    #[must_use]
    pub fn entry(&self, kind: ModuleKind) -> Option<&ModuleEntry> {
        self.entries.iter().find(|e| e.kind() == kind)
    }

    /// Whether a module of this kind is active.
    #[must_use]
    pub fn contains(&self, kind: ModuleKind) -> bool {
        self.entry(kind).is_some()
    }

    /// Remove a module.
    pub fn remove(&mut self, kind: ModuleKind) -> Option<SmartModule> {
        let pos = self.entries.iter().position(|e| e.kind() == kind)?;
        Some(self.entries.remove(pos).module)
    }

    /// Active module kinds, in insertion order.
    pub fn kinds(&self) -> impl Iterator<Item = ModuleKind> + '_ {
        self.entries.iter().map(ModuleEntry::kind)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ModuleEntry> {
        self.entries.iter_mut()
    }

    /// Number of active modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no module is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

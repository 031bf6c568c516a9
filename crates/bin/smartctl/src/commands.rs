//! Command dispatch against a device session.
//!
//! Every command yields both a JSON value (for `--json`) and a
//! human-readable report.

use std::time::Duration;

use serde_json::{Value, json};

use smartlink_app::{Protocol, SmartDevice};
use smartlink_domain::error::SmartError;
use smartlink_domain::feature::FeatureValue;
use smartlink_domain::id::DeviceId;

use crate::cli::{Command, WifiCommand};

/// Result of one command.
#[derive(Debug)]
pub struct Output {
    pub json: Value,
    pub text: String,
}

impl Output {
    fn value(json: Value) -> Self {
        let text = serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string());
        Self { json, text }
    }

    fn message(text: impl Into<String>, json: Value) -> Self {
        Self {
            json,
            text: text.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Device(#[from] SmartError),
    #[error("pairing and unpairing are run on the parent device")]
    ParentOnly,
    #[error("invalid JSON parameters")]
    Params(#[source] serde_json::Error),
}

/// Run `command` on the device, or on one of its children.
///
/// # Errors
///
/// Returns the device error of the underlying call, [`SmartError::UnknownChild`]
/// for an unknown `child`, and [`CommandError::Params`] for malformed raw
/// parameters.
pub async fn run<P: Protocol>(
    device: &mut SmartDevice<P>,
    command: &Command,
    child: Option<&str>,
) -> Result<Output, CommandError> {
    match command {
        Command::Pair { timeout } => {
            if child.is_some() {
                return Err(CommandError::ParentOnly);
            }
            let outcome = device.pair(timeout.map(Duration::from_secs)).await?;
            return Ok(match outcome {
                Some(outcome) => {
                    let text = format!("Paired {} device(s)", outcome.devices.len());
                    Output::message(text, json!(outcome))
                }
                None => Output::message("No devices found", Value::Null),
            });
        }
        Command::Unpair { child_id } => {
            if child.is_some() {
                return Err(CommandError::ParentOnly);
            }
            let id = DeviceId::new(child_id.as_str()).map_err(SmartError::from)?;
            let response = device.unpair(&id).await?;
            return Ok(Output::message(format!("Removed {id}"), response));
        }
        _ => {}
    }

    let target = match child {
        Some(id) => device
            .child_mut(id)
            .ok_or_else(|| SmartError::UnknownChild(id.to_owned()))?,
        None => device,
    };
    run_on(target, command).await
}

async fn run_on<P: Protocol>(device: &mut SmartDevice<P>, command: &Command) -> Result<Output, CommandError> {
    let output = match command {
        Command::State => Output::message(state_report(device), device.internal_state().to_json()),
        Command::On => Output::message("Turning on", device.turn_on().await?),
        Command::Off => Output::message("Turning off", device.turn_off().await?),
        Command::Toggle => {
            let on = !device.is_on();
            let response = device.set_state(on).await?;
            Output::message(if on { "Turning on" } else { "Turning off" }, response)
        }
        Command::Alias { name } => Output::message(format!("Setting alias to {name}"), device.set_alias(name).await?),
        Command::Reboot { delay } => Output::message("Rebooting", device.reboot(*delay).await?),
        Command::FactoryReset => Output::message("Resetting to factory settings", device.factory_reset().await?),
        Command::Sysinfo => Output::value(json!({
            "info": device.state().info(),
            "hw_info": device.hw_info(),
        })),
        Command::Feature { id, value } => feature(device, id.as_deref(), value.as_deref()).await?,
        Command::Wifi(WifiCommand::Scan) => {
            let networks = device.wifi_scan().await?;
            let lines: Vec<String> = networks
                .iter()
                .map(|n| format!("{} (signal {}, {})", n.ssid, n.signal_level, n.key_type))
                .collect();
            Output::message(lines.join("\n"), json!(networks))
        }
        Command::Wifi(WifiCommand::Join { ssid, password, keytype }) => {
            device.wifi_join(ssid, password, keytype).await?;
            Output::message(format!("Asked the device to join {ssid}"), Value::Null)
        }
        Command::UpdateCredentials { username, password } => Output::message(
            "Credentials updated",
            device.update_credentials(username, password).await?,
        ),
        Command::Raw { method, params } => {
            let params = params
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(CommandError::Params)?;
            Output::value(device.query_helper(method, params).await?)
        }
        Command::Pair { .. } | Command::Unpair { .. } => return Err(CommandError::ParentOnly),
    };
    Ok(output)
}

async fn feature<P: Protocol>(
    device: &mut SmartDevice<P>,
    id: Option<&str>,
    value: Option<&str>,
) -> Result<Output, CommandError> {
    let Some(id) = id else {
        return Ok(Output::message(feature_lines(device).join("\n"), feature_values(device)));
    };
    let Some(value) = value else {
        let current = device.feature_value(id).map_err(SmartError::from)?;
        let text = current.as_ref().map_or_else(|| "None".to_string(), ToString::to_string);
        return Ok(Output::message(text, json!({ id: current })));
    };
    let response = device.set_feature_value(id, FeatureValue::parse(value)).await?;
    Ok(Output::message(format!("Changing {id} to {value}"), response))
}

fn feature_values<P>(device: &SmartDevice<P>) -> Value {
    let values: serde_json::Map<String, Value> = device
        .features()
        .iter()
        .map(|f| (f.id().to_owned(), json!(f.value(device.state()))))
        .collect();
    Value::Object(values)
}

fn feature_lines<P>(device: &SmartDevice<P>) -> Vec<String> {
    device
        .features()
        .iter()
        .map(|f| {
            let value = f
                .value(device.state())
                .as_ref()
                .map_or_else(|| "None".to_string(), ToString::to_string);
            match f.unit_of_measure() {
                Some(unit) => format!("{} ({}): {value} {unit}", f.name(), f.id()),
                None => format!("{} ({}): {value}", f.name(), f.id()),
            }
        })
        .collect()
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

/// Human-readable summary of the device, its children and its features.
pub fn state_report<P>(device: &SmartDevice<P>) -> String {
    let alias = device.alias().unwrap_or_default();
    let mut lines = vec![
        format!("== {alias} - {} ==", device.model().unwrap_or("unknown")),
        format!("Host: {}", device.host()),
        format!("Device category: {}", device.device_category()),
        format!("Device state: {}", on_off(device.is_on())),
        format!("Time: {}", device.time()),
    ];
    if let Some(since) = device.on_since() {
        lines.push(format!("On since: {since}"));
    }
    lines.push(format!(
        "Cloud connected: {}",
        if device.is_cloud_connected() { "yes" } else { "no" }
    ));
    if let Some(mac) = device.mac_address() {
        lines.push(format!("MAC: {mac}"));
    }
    let location = device.location();
    lines.push(format!("Location: {}, {}", location.latitude, location.longitude));

    if device.children().next().is_some() {
        lines.push(String::new());
        lines.push("== Children ==".to_string());
        for child in device.children() {
            let id = child.device_id().map(|id| id.to_string()).unwrap_or_default();
            lines.push(format!(
                "* {} ({id}): {}",
                child.alias().unwrap_or_default(),
                on_off(child.is_on())
            ));
        }
    }

    lines.push(String::new());
    lines.push("== Features ==".to_string());
    lines.extend(feature_lines(device));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use smartlink_adapter_virtual::{DeviceKind, VirtualProtocol};
    use smartlink_app::DeviceConfig;
    use smartlink_domain::credentials::Credentials;

    use super::*;

    async fn ready(kind: DeviceKind) -> (SmartDevice<VirtualProtocol>, Arc<VirtualProtocol>) {
        let config = DeviceConfig::new("127.0.0.1").with_credentials(Credentials::new("u", "p"));
        let protocol = Arc::new(VirtualProtocol::new(kind));
        let mut device = SmartDevice::with_protocol(config, Arc::clone(&protocol));
        device.update(true).await.unwrap();
        (device, protocol)
    }

    #[tokio::test]
    async fn should_report_state_with_children_and_features() {
        let (mut strip, _) = ready(DeviceKind::Strip).await;

        let output = run(&mut strip, &Command::State, None).await.unwrap();

        assert!(output.text.contains("Device category: strip"));
        assert!(output.text.contains("== Children =="));
        assert!(output.text.contains("Socket 1"));
        assert!(output.text.contains("(device_id)"));
    }

    #[tokio::test]
    async fn should_toggle_device_state() {
        let (mut plug, protocol) = ready(DeviceKind::Plug).await;

        run(&mut plug, &Command::Toggle, None).await.unwrap();

        assert_eq!(protocol.info(None).unwrap()["device_on"], json!(false));
    }

    #[tokio::test]
    async fn should_target_child_when_requested() {
        let (mut strip, protocol) = ready(DeviceKind::Strip).await;

        run(&mut strip, &Command::On, Some("virtual-strip-socket-3")).await.unwrap();

        assert_eq!(protocol.info(Some("virtual-strip-socket-3")).unwrap()["device_on"], json!(true));
        assert_eq!(protocol.info(Some("virtual-strip-socket-2")).unwrap()["device_on"], json!(false));
    }

    #[tokio::test]
    async fn should_fail_for_unknown_child() {
        let (mut strip, _) = ready(DeviceKind::Strip).await;

        let err = run(&mut strip, &Command::On, Some("nope")).await.unwrap_err();

        assert!(matches!(err, CommandError::Device(SmartError::UnknownChild(_))));
    }

    #[tokio::test]
    async fn should_read_and_set_features() {
        let (mut bulb, protocol) = ready(DeviceKind::Bulb).await;

        let read = run(
            &mut bulb,
            &Command::Feature { id: Some("brightness".into()), value: None },
            None,
        )
        .await
        .unwrap();
        run(
            &mut bulb,
            &Command::Feature { id: Some("brightness".into()), value: Some("42".into()) },
            None,
        )
        .await
        .unwrap();

        assert_eq!(read.json, json!({"brightness": 80}));
        assert_eq!(protocol.info(None).unwrap()["brightness"], json!(42));
    }

    #[tokio::test]
    async fn should_pass_raw_command_through() {
        let (mut plug, _) = ready(DeviceKind::Plug).await;
        let command = Command::Raw {
            method: "get_device_time".into(),
            params: None,
        };

        let output = run(&mut plug, &command, None).await.unwrap();

        assert_eq!(output.json["region"], json!("Europe/Berlin"));
    }

    #[tokio::test]
    async fn should_reject_malformed_raw_params() {
        let (mut plug, _) = ready(DeviceKind::Plug).await;
        let command = Command::Raw {
            method: "set_device_info".into(),
            params: Some("{not json".into()),
        };

        let err = run(&mut plug, &command, None).await.unwrap_err();

        assert!(matches!(err, CommandError::Params(_)));
    }

    #[tokio::test]
    async fn should_refuse_pairing_on_a_child() {
        let (mut hub, _) = ready(DeviceKind::Hub).await;

        let err = run(&mut hub, &Command::Pair { timeout: None }, Some("virtual-sensor-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::ParentOnly));
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_paired_devices() {
        let (mut hub, _) = ready(DeviceKind::Hub).await;

        let output = run(&mut hub, &Command::Pair { timeout: Some(5) }, None).await.unwrap();

        assert_eq!(output.text, "Paired 1 device(s)");
        assert_eq!(output.json["devices"][0]["device_id"], json!("virtual-sensor-2"));
    }

    #[tokio::test]
    async fn should_list_scanned_networks() {
        let (mut plug, _) = ready(DeviceKind::Plug).await;

        let output = run(&mut plug, &Command::Wifi(WifiCommand::Scan), None).await.unwrap();

        assert!(output.text.starts_with("Home"));
        assert_eq!(output.json.as_array().map(Vec::len), Some(2));
    }
}

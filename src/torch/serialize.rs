//! Serialization helpers for torch types.
use serde::{Deserialize, Serialize};
use tch::Device;

/// Serializable mirror of [`tch::Device`] for use with `#[serde(with = "DeviceDef")]`.
#[derive(Serialize, Deserialize)]
#[serde(remote = "Device")]
pub enum DeviceDef {
    Cpu,
    Cuda(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct WithDevice {
        #[serde(with = "DeviceDef")]
        device: Device,
    }

    #[test]
    fn device_json() {
        let value = WithDevice {
            device: Device::Cuda(1),
        };
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"device":{"Cuda":1}}"#);
        let parsed: WithDevice = serde_json::from_str(r#"{"device":"Cpu"}"#).unwrap();
        assert_eq!(parsed.device, Device::Cpu);
    }
}

//! Render endpoint enumeration.

use tracing::{debug, instrument};
use windows::core::PCWSTR;
use windows::Win32::Media::Audio::{
    eConsole, eRender, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator, DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED, STGM_READ,
};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

use regionrec_ipc::AudioDevice;

use crate::error::AudioError;
use crate::AudioResult;

/// Initialize COM for the current thread if not already initialized.
pub(crate) fn ensure_com_initialized() -> AudioResult<()> {
    unsafe {
        // S_FALSE means this thread was already initialized.
        let result = CoInitializeEx(None, COINIT_MULTITHREADED);
        if result.is_err() && result != windows::Win32::Foundation::S_FALSE {
            return Err(AudioError::WindowsApi {
                message: "Failed to initialize COM".to_string(),
                source: None,
            });
        }
    }
    Ok(())
}

/// Enumerate active render endpoints; each one can be opened in loopback mode.
#[instrument(name = "enumerate_loopback_devices")]
pub fn enumerate_loopback_devices() -> AudioResult<Vec<AudioDevice>> {
    ensure_com_initialized()?;

    let enumerator: IMMDeviceEnumerator =
        unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)? };

    let default_id = unsafe {
        enumerator
            .GetDefaultAudioEndpoint(eRender, eConsole)
            .ok()
            .and_then(|device| device.GetId().ok())
            .map(|id| id.to_string().unwrap_or_default())
    };

    let collection = unsafe { enumerator.EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE)? };
    let count = unsafe { collection.GetCount()? };

    let mut devices = Vec::with_capacity(count as usize);
    for i in 0..count {
        let device: IMMDevice = unsafe { collection.Item(i)? };
        if let Ok(info) = device_info(&device, default_id.as_deref()) {
            devices.push(info);
        }
    }

    debug!(count = devices.len(), "Enumerated loopback endpoints");
    Ok(devices)
}

fn device_info(device: &IMMDevice, default_id: Option<&str>) -> AudioResult<AudioDevice> {
    let id = unsafe {
        let id_ptr = device.GetId()?;
        id_ptr.to_string().map_err(|_| AudioError::WindowsApi {
            message: "Failed to read endpoint ID".to_string(),
            source: None,
        })?
    };

    let name = friendly_name(device).unwrap_or_else(|_| "Unknown Device".to_string());
    let is_default = default_id == Some(id.as_str());

    Ok(AudioDevice {
        id,
        name,
        is_default,
    })
}

fn friendly_name(device: &IMMDevice) -> AudioResult<String> {
    // PKEY_Device_FriendlyName
    let key = PROPERTYKEY {
        fmtid: windows::core::GUID::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0),
        pid: 14,
    };

    let name = unsafe {
        let store: IPropertyStore = device.OpenPropertyStore(STGM_READ)?;
        store.GetValue(&key)?.to_string()
    };

    if name.is_empty() {
        Ok("Unknown".to_string())
    } else {
        Ok(name)
    }
}

/// Look up an endpoint by its ID.
pub(crate) fn find_device_by_id(id: &str) -> AudioResult<IMMDevice> {
    ensure_com_initialized()?;

    let enumerator: IMMDeviceEnumerator =
        unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)? };

    let id_wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();

    unsafe {
        enumerator
            .GetDevice(PCWSTR(id_wide.as_ptr()))
            .map_err(|_| AudioError::DeviceUnavailable(id.to_string()))
    }
}

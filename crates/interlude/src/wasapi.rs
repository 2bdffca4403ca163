//! Windows audio-session adapter (WASAPI).
//!
//! Sessions are enumerated on the default render endpoint. Each registered
//! session gets an `IAudioSessionEvents` object that forwards state changes
//! to the monitor's notifier from whatever thread COM calls it on.

use std::collections::HashSet;

use anyhow::Result;

use interlude_core::audio::{AudioSubsystem, ProcessId};

/// Open the platform audio subsystem.
#[cfg(windows)]
pub fn open() -> Result<Box<dyn AudioSubsystem>> {
    Ok(Box::new(imp::WasapiAudio::new()?))
}

/// Open the platform audio subsystem.
#[cfg(not(windows))]
pub fn open() -> Result<Box<dyn AudioSubsystem>> {
    anyhow::bail!("audio session monitoring is only supported on Windows")
}

/// Keep the first session of each process and drop system sessions (pid 0).
///
/// The registry tracks one session per process and keeps the first one
/// listed, so the adapter must register that same session.
#[cfg_attr(not(windows), allow(dead_code))]
fn first_per_process<T>(
    sessions: impl IntoIterator<Item = (ProcessId, T)>,
) -> Vec<(ProcessId, T)> {
    let mut seen = HashSet::new();
    sessions
        .into_iter()
        .filter(|(process_id, _)| *process_id != 0 && seen.insert(*process_id))
        .collect()
}

#[cfg(windows)]
mod imp {
    use std::collections::HashMap;

    use anyhow::{Context, Result};
    use sysinfo::{Pid, ProcessesToUpdate, System};
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::Media::Audio::{
        AudioSessionDisconnectReason, AudioSessionState, IAudioSessionControl,
        IAudioSessionControl2, IAudioSessionEvents, IAudioSessionEvents_Impl,
        IAudioSessionManager2, IMMDeviceEnumerator, MMDeviceEnumerator, eMultimedia, eRender,
    };
    use windows::Win32::System::Com::{
        CLSCTX_ALL, COINIT_MULTITHREADED, CoCreateInstance, CoInitializeEx, CoUninitialize,
    };
    use windows::core::{GUID, HRESULT, Interface, PCWSTR, implement};

    use interlude_core::audio::{
        AudioEvent, AudioSubsystem, Notifier, ProcessId, SessionInfo, SessionState,
    };
    use interlude_core::error::AudioError;

    /// `HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`, returned when no render endpoint exists.
    const E_NOTFOUND: HRESULT = HRESULT(0x8007_0490_u32 as i32);

    #[implement(IAudioSessionEvents)]
    struct SessionEvents {
        process_id: ProcessId,
        notify: Notifier,
    }

    impl IAudioSessionEvents_Impl for SessionEvents_Impl {
        fn OnDisplayNameChanged(
            &self,
            _newdisplayname: &PCWSTR,
            _eventcontext: *const GUID,
        ) -> windows::core::Result<()> {
            Ok(())
        }

        fn OnIconPathChanged(
            &self,
            _newiconpath: &PCWSTR,
            _eventcontext: *const GUID,
        ) -> windows::core::Result<()> {
            Ok(())
        }

        fn OnSimpleVolumeChanged(
            &self,
            _newvolume: f32,
            _newmute: BOOL,
            _eventcontext: *const GUID,
        ) -> windows::core::Result<()> {
            Ok(())
        }

        fn OnChannelVolumeChanged(
            &self,
            _channelcount: u32,
            _newchannelvolumearray: *const f32,
            _changedchannel: u32,
            _eventcontext: *const GUID,
        ) -> windows::core::Result<()> {
            Ok(())
        }

        fn OnGroupingParamChanged(
            &self,
            _newgroupingparam: *const GUID,
            _eventcontext: *const GUID,
        ) -> windows::core::Result<()> {
            Ok(())
        }

        fn OnStateChanged(&self, newstate: AudioSessionState) -> windows::core::Result<()> {
            (self.notify)(AudioEvent::StateChanged {
                process_id: self.process_id,
                raw_state: newstate.0,
            });
            Ok(())
        }

        fn OnSessionDisconnected(
            &self,
            disconnectreason: AudioSessionDisconnectReason,
        ) -> windows::core::Result<()> {
            (self.notify)(AudioEvent::Disconnected {
                process_id: self.process_id,
                reason: disconnectreason.0,
            });
            Ok(())
        }
    }

    struct Registration {
        control: IAudioSessionControl,
        events: IAudioSessionEvents,
    }

    /// Keeps COM initialized for the owning thread.
    struct ComGuard;

    impl ComGuard {
        fn init() -> Result<Self> {
            unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }
                .ok()
                .context("initialize COM")?;
            Ok(Self)
        }
    }

    impl Drop for ComGuard {
        fn drop(&mut self) {
            unsafe { CoUninitialize() };
        }
    }

    /// WASAPI adapter. Must stay on the thread that created it.
    pub struct WasapiAudio {
        system: System,
        /// Session controls seen by the last listing, by pid.
        controls: HashMap<ProcessId, IAudioSessionControl>,
        registrations: HashMap<ProcessId, Registration>,
        // Dropped last: COM objects above must be released first.
        _com: ComGuard,
    }

    impl WasapiAudio {
        pub fn new() -> Result<Self> {
            let com = ComGuard::init()?;
            Ok(Self {
                system: System::new(),
                controls: HashMap::new(),
                registrations: HashMap::new(),
                _com: com,
            })
        }

        fn session_manager(&self) -> Result<IAudioSessionManager2, AudioError> {
            unsafe {
                let enumerator: IMMDeviceEnumerator =
                    CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(backend)?;
                let device = match enumerator.GetDefaultAudioEndpoint(eRender, eMultimedia) {
                    Ok(device) => device,
                    Err(err) if err.code() == E_NOTFOUND => return Err(AudioError::Unavailable),
                    Err(err) => return Err(backend(err)),
                };
                device.Activate(CLSCTX_ALL, None).map_err(backend)
            }
        }

        fn process_name(&mut self, process_id: ProcessId) -> Option<String> {
            let pid = Pid::from_u32(process_id);
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            self.system
                .process(pid)
                .map(|p| p.name().to_string_lossy().into_owned())
        }
    }

    impl AudioSubsystem for WasapiAudio {
        fn list_sessions(
            &mut self,
            process_names: &[String],
        ) -> Result<Vec<SessionInfo>, AudioError> {
            let manager = self.session_manager()?;
            let mut listed = Vec::new();
            unsafe {
                let sessions = manager.GetSessionEnumerator().map_err(backend)?;
                let count = sessions.GetCount().map_err(backend)?;
                for index in 0..count {
                    let control = sessions.GetSession(index).map_err(backend)?;
                    let control2: IAudioSessionControl2 = control.cast().map_err(backend)?;
                    listed.push((control2.GetProcessId().map_err(backend)?, control));
                }
            }

            let mut found = Vec::new();
            let mut controls = HashMap::new();
            for (process_id, control) in super::first_per_process(listed) {
                let Some(process_name) = self.process_name(process_id) else {
                    continue;
                };
                if !process_names.iter().any(|name| *name == process_name) {
                    continue;
                }
                let raw_state = unsafe { control.GetState() }.map_err(backend)?.0;
                let Some(state) = SessionState::from_raw(raw_state) else {
                    tracing::warn!(pid = process_id, raw_state, "unknown audio session state");
                    continue;
                };
                controls.insert(process_id, control);
                found.push(SessionInfo {
                    process_id,
                    process_name,
                    state,
                });
            }
            self.controls = controls;
            Ok(found)
        }

        fn register(&mut self, process_id: ProcessId, notify: Notifier) -> Result<(), AudioError> {
            if self.registrations.contains_key(&process_id) {
                return Ok(());
            }
            let control = self
                .controls
                .get(&process_id)
                .cloned()
                .ok_or(AudioError::SessionNotFound(process_id))?;
            let events: IAudioSessionEvents = SessionEvents { process_id, notify }.into();
            unsafe { control.RegisterAudioSessionNotification(&events) }.map_err(backend)?;
            self.registrations
                .insert(process_id, Registration { control, events });
            Ok(())
        }

        fn unregister(&mut self, process_id: ProcessId) {
            let Some(reg) = self.registrations.remove(&process_id) else {
                return;
            };
            if let Err(err) = unsafe { reg.control.UnregisterAudioSessionNotification(&reg.events) }
            {
                tracing::warn!(pid = process_id, error = %err, "failed to unregister session events");
            }
        }
    }

    impl Drop for WasapiAudio {
        fn drop(&mut self) {
            let pids: Vec<ProcessId> = self.registrations.keys().copied().collect();
            for pid in pids {
                self.unregister(pid);
            }
        }
    }

    fn backend(err: windows::core::Error) -> AudioError {
        AudioError::Backend(err.to_string())
    }
}

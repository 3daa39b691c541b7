// SPDX-License-Identifier: GPL-3.0-only

//! Callouts and helpers as child processes
//!
//! Spawning and waiting happens on the tokio runtime; the device tree thread
//! only hands over a [`Completion`] and keeps pumping its own loop.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use hal_core::{
    CalloutPhase, Callouts, Completion, HelperRequest, HelperStatus, callout_programs,
    helper_environment,
};
use hal_types::Device;
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

pub struct ProcessCallouts {
    runtime: Handle,
    search_path: Option<OsString>,
    timeout: Duration,
}

impl ProcessCallouts {
    pub fn new(runtime: Handle, helper_path: &[PathBuf], timeout: Duration) -> Self {
        let search_path = std::env::join_paths(helper_path)
            .inspect_err(|e| warn!("ignoring helper_path: {e}"))
            .ok()
            .filter(|joined| !joined.is_empty());

        Self {
            runtime,
            search_path,
            timeout,
        }
    }

    /// `command` split on whitespace, its program looked up in the helper
    /// directories first and then in `PATH`.
    fn argv(&self, command: &str) -> Vec<OsString> {
        let mut words = command.split_whitespace();
        let Some(program) = words.next() else {
            return Vec::new();
        };

        let resolved = if program.contains('/') {
            PathBuf::from(program)
        } else {
            self.search_path
                .as_ref()
                .and_then(|paths| which::which_in(program, Some(paths), "/").ok())
                .or_else(|| which::which(program).ok())
                .unwrap_or_else(|| PathBuf::from(program))
        };

        std::iter::once(resolved.into_os_string())
            .chain(words.map(OsString::from))
            .collect()
    }
}

impl Callouts for ProcessCallouts {
    fn run_callouts(&mut self, device: &Device, phase: CalloutPhase, done: Completion) {
        let programs = callout_programs(device, phase);
        if programs.is_empty() {
            done.complete(HelperStatus::Exited(0));
            return;
        }

        let mut env = helper_environment(device);
        env.push(("HALD_ACTION".to_string(), phase.as_str().to_string()));
        let commands: Vec<(String, Vec<OsString>)> = programs
            .into_iter()
            .map(|program| {
                let argv = self.argv(&program);
                (program, argv)
            })
            .collect();
        let timeout = self.timeout;
        let udi = device.udi().unwrap_or_default().to_string();

        self.runtime.spawn(async move {
            let mut last = HelperStatus::Exited(0);
            for (program, argv) in commands {
                last = run_command(&argv, &env, timeout).await;
                if last != HelperStatus::Exited(0) {
                    warn!(%udi, %phase, %program, status = ?last, "callout failed");
                }
            }
            done.complete(last);
        });
    }

    fn run_helper(&mut self, device: &Device, request: HelperRequest, done: Completion) {
        let HelperRequest {
            command,
            timeout,
            extra_env,
        } = request;
        let mut env = helper_environment(device);
        env.extend(extra_env);
        let argv = self.argv(&command);

        self.runtime.spawn(async move {
            let status = run_command(&argv, &env, timeout).await;
            debug!(%command, ?status, "helper exited");
            done.complete(status);
        });
    }
}

async fn run_command(argv: &[OsString], env: &[(String, String)], timeout: Duration) -> HelperStatus {
    let Some((program, args)) = argv.split_first() else {
        return HelperStatus::Failed("empty command".to_string());
    };

    let mut child = match Command::new(program)
        .args(args)
        .envs(env.iter().cloned())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            error!("failed to spawn {}: {e}", program.to_string_lossy());
            return HelperStatus::Failed(e.to_string());
        }
    };

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => match status.code() {
            Some(code) => HelperStatus::Exited(code),
            None => HelperStatus::Signaled,
        },
        Ok(Err(e)) => HelperStatus::Failed(e.to_string()),
        Err(_) => {
            warn!("{} timed out after {timeout:?}", program.to_string_lossy());
            if let Err(e) = child.kill().await {
                debug!("kill after timeout failed: {e}");
            }
            HelperStatus::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal_core::{EventSource, LoopEvent, channel};
    use hal_types::DeviceId;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime")
    }

    #[test]
    fn exit_codes_and_timeouts_are_reported() {
        let rt = runtime();
        let sh = |script: &str| vec![OsString::from("/bin/sh"), OsString::from("-c"), OsString::from(script)];

        let ok = rt.block_on(run_command(&sh("exit 0"), &[], Duration::from_secs(5)));
        let failed = rt.block_on(run_command(&sh("exit 3"), &[], Duration::from_secs(5)));
        let slow = rt.block_on(run_command(&sh("sleep 5"), &[], Duration::from_millis(50)));
        let env = rt.block_on(run_command(
            &sh("test \"$UDI\" = /x"),
            &[("UDI".to_string(), "/x".to_string())],
            Duration::from_secs(5),
        ));

        assert_eq!(ok, HelperStatus::Exited(0));
        assert_eq!(failed.exit_code(), 3);
        assert_eq!(slow, HelperStatus::TimedOut);
        assert_eq!(slow.exit_code(), -1);
        assert_eq!(env, HelperStatus::Exited(0));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let rt = runtime();
        let status = rt.block_on(run_command(
            &[OsString::from("/nonexistent/hald-probe-nothing")],
            &[],
            Duration::from_secs(1),
        ));
        assert!(matches!(status, HelperStatus::Failed(_)));
    }

    #[test]
    fn no_programs_complete_immediately() {
        let rt = runtime();
        let (handle, mut source) = channel();
        let mut bridge = hal_core::Bridge::new(handle, NeverSource);
        let mut callouts = ProcessCallouts::new(rt.handle().clone(), &[], Duration::from_secs(1));

        let done = bridge.completion();
        let token = done.token();
        callouts.run_callouts(&Device::new(DeviceId::new(0)), CalloutPhase::Add, done);

        assert_eq!(
            source.next_event(),
            Some(LoopEvent::Completed {
                token,
                status: HelperStatus::Exited(0)
            })
        );
    }

    struct NeverSource;

    impl EventSource for NeverSource {
        fn next_event(&mut self) -> Option<LoopEvent> {
            None
        }
    }

    #[test]
    fn absolute_programs_are_not_resolved() {
        let rt = runtime();
        let callouts = ProcessCallouts::new(rt.handle().clone(), &[], Duration::from_secs(1));
        assert_eq!(
            callouts.argv("/usr/local/libexec/hald-probe-smbios --verbose"),
            vec![
                OsString::from("/usr/local/libexec/hald-probe-smbios"),
                OsString::from("--verbose")
            ]
        );
        assert!(callouts.argv("   ").is_empty());
    }
}

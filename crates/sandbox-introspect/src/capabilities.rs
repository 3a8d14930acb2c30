//! Capability bindings a host can place into a guarded context.

use std::net::IpAddr;
use std::sync::Arc;

use sandbox_core::{Namespace, NativeError, Value};
use sandbox_types::ExceptionKind;

use crate::launcher::ProcessLauncher;
use crate::network::{self, InterfaceError};
use crate::proc_stats::{ProcFs, UPTIME_GRANULARITY};

fn os_error(err: impl std::fmt::Display) -> NativeError {
    NativeError::new(ExceptionKind::OSError, err.to_string())
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), NativeError> {
    if args.len() != count {
        return Err(NativeError::type_error(format!(
            "{}() takes {} argument(s) ({} given)",
            name,
            count,
            args.len()
        )));
    }
    Ok(())
}

fn ip_arg(name: &str, value: &Value) -> Result<IpAddr, NativeError> {
    let text = value
        .as_str()
        .ok_or_else(|| NativeError::type_error(format!("{}() expects IP addresses as str", name)))?;
    text.trim().parse().map_err(|_| {
        NativeError::new(
            ExceptionKind::ValueError,
            format!("{}() got an invalid IP address: {}", name, value.repr()),
        )
    })
}

fn port_arg(name: &str, value: &Value) -> Result<u16, NativeError> {
    value
        .as_int()
        .and_then(|port| u16::try_from(port).ok())
        .ok_or_else(|| {
            NativeError::new(
                ExceptionKind::ValueError,
                format!("{}() got an invalid port: {}", name, value.repr()),
            )
        })
}

fn float(result: std::io::Result<f64>) -> Result<Value, NativeError> {
    result.map(Value::Float).map_err(os_error)
}

fn count(result: std::io::Result<u64>) -> Result<Value, NativeError> {
    let value = result.map_err(os_error)?;
    i64::try_from(value)
        .map(Value::Int)
        .map_err(|_| NativeError::new(ExceptionKind::OverflowError, "value too large"))
}

/// Every introspection capability, keyed by the name sandboxed code calls it
/// by. All names are plain identifiers, so the default guard admits them.
pub fn capabilities(launcher: Arc<dyn ProcessLauncher>) -> Namespace {
    capabilities_with(ProcFs::default(), launcher)
}

/// [`capabilities`] reading from an explicit procfs root.
pub fn capabilities_with(procfs: ProcFs, launcher: Arc<dyn ProcessLauncher>) -> Namespace {
    let procfs = Arc::new(procfs);
    let mut bindings = Namespace::new();

    let p = procfs.clone();
    bindings.insert(
        "process_cpu_time".to_string(),
        Value::native("process_cpu_time", move |args| {
            expect_args("process_cpu_time", args, 0)?;
            float(p.process_cpu_time())
        }),
    );

    let p = procfs.clone();
    bindings.insert(
        "thread_cpu_time".to_string(),
        Value::native("thread_cpu_time", move |args| {
            expect_args("thread_cpu_time", args, 0)?;
            float(p.thread_cpu_time())
        }),
    );

    let p = procfs.clone();
    bindings.insert(
        "process_rss".to_string(),
        Value::native("process_rss", move |args| {
            expect_args("process_rss", args, 0)?;
            count(p.process_rss())
        }),
    );

    let p = procfs.clone();
    bindings.insert(
        "system_uptime".to_string(),
        Value::native("system_uptime", move |args| {
            expect_args("system_uptime", args, 0)?;
            float(p.system_uptime())
        }),
    );

    bindings.insert(
        "uptime_granularity".to_string(),
        Value::native("uptime_granularity", |args| {
            expect_args("uptime_granularity", args, 0)?;
            Ok(Value::Float(UPTIME_GRANULARITY))
        }),
    );

    let p = procfs.clone();
    bindings.insert(
        "system_thread_count".to_string(),
        Value::native("system_thread_count", move |args| {
            expect_args("system_thread_count", args, 0)?;
            count(p.system_thread_count())
        }),
    );

    let p = procfs.clone();
    bindings.insert(
        "available_interfaces".to_string(),
        Value::native("available_interfaces", move |args| {
            expect_args("available_interfaces", args, 0)?;
            let names = p.available_interfaces().map_err(os_error)?;
            Ok(Value::list(names.into_iter().map(Value::from).collect()))
        }),
    );

    bindings.insert(
        "interface_ip_addresses".to_string(),
        Value::native("interface_ip_addresses", move |args| {
            expect_args("interface_ip_addresses", args, 1)?;
            let name = args[0].as_str().ok_or_else(|| {
                NativeError::type_error("interface_ip_addresses() expects an interface name")
            })?;
            match network::interface_ip_addresses(launcher.as_ref(), name) {
                Ok(addresses) => Ok(Value::list(addresses.into_iter().map(Value::from).collect())),
                Err(err @ InterfaceError::InvalidName(_)) => {
                    Err(NativeError::new(ExceptionKind::ValueError, err.to_string()))
                }
                Err(err) => Err(os_error(err)),
            }
        }),
    );

    // Returns [exists, state]; the language has no tuples.
    let p = procfs.clone();
    bindings.insert(
        "exists_outgoing_socket".to_string(),
        Value::native("exists_outgoing_socket", move |args| {
            const NAME: &str = "exists_outgoing_socket";
            expect_args(NAME, args, 4)?;
            if !args.iter().all(Value::is_truthy) {
                return Ok(Value::list(vec![Value::Bool(false), Value::None]));
            }
            let local = (ip_arg(NAME, &args[0])?, port_arg(NAME, &args[1])?);
            let remote = (ip_arg(NAME, &args[2])?, port_arg(NAME, &args[3])?);
            let state = network::outgoing_socket_state(&p, local, remote).map_err(os_error)?;
            Ok(match state {
                Some(state) => Value::list(vec![Value::Bool(true), Value::from(state)]),
                None => Value::list(vec![Value::Bool(false), Value::None]),
            })
        }),
    );

    let p = procfs;
    bindings.insert(
        "exists_listening_socket".to_string(),
        Value::native("exists_listening_socket", move |args| {
            const NAME: &str = "exists_listening_socket";
            expect_args(NAME, args, 3)?;
            if !(args[0].is_truthy() && args[1].is_truthy()) {
                return Ok(Value::Bool(false));
            }
            let ip = ip_arg(NAME, &args[0])?;
            let port = port_arg(NAME, &args[1])?;
            network::listening_socket_exists(&p, ip, port, args[2].is_truthy())
                .map(Value::Bool)
                .map_err(os_error)
        }),
    );

    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::DisabledLauncher;
    use sandbox_core::guard::is_identifier;

    fn call(bindings: &Namespace, name: &str, args: Vec<Value>) -> Result<Value, NativeError> {
        match bindings.get(name) {
            Some(Value::Native(native)) => native.call(&args),
            other => panic!("{} is not a capability: {:?}", name, other),
        }
    }

    #[test]
    fn every_capability_name_is_an_identifier() {
        let bindings = capabilities(Arc::new(DisabledLauncher));
        assert_eq!(bindings.len(), 10);
        assert!(bindings.keys().all(|name| is_identifier(name) && !name.starts_with('_')));
    }

    #[test]
    fn missing_procfs_is_an_os_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bindings = capabilities_with(ProcFs::new(dir.path()), Arc::new(DisabledLauncher));
        let err = call(&bindings, "system_uptime", vec![]).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OSError);
    }

    #[test]
    fn falsy_socket_arguments_short_circuit() {
        let bindings = capabilities(Arc::new(DisabledLauncher));
        let result = call(
            &bindings,
            "exists_outgoing_socket",
            vec![Value::str(""), Value::Int(1), Value::str("1.2.3.4"), Value::Int(2)],
        )
        .unwrap();
        assert_eq!(result, Value::list(vec![Value::Bool(false), Value::None]));
        let result = call(
            &bindings,
            "exists_listening_socket",
            vec![Value::str("127.0.0.1"), Value::Int(0), Value::Bool(true)],
        )
        .unwrap();
        assert_eq!(result, Value::Bool(false));
    }

    #[test]
    fn bad_arguments_are_reported() {
        let bindings = capabilities(Arc::new(DisabledLauncher));
        let err = call(
            &bindings,
            "exists_listening_socket",
            vec![Value::str("not-an-ip"), Value::Int(80), Value::Bool(true)],
        )
        .unwrap_err();
        assert_eq!(err.kind, ExceptionKind::ValueError);
        let err = call(&bindings, "process_rss", vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::TypeError);
    }

    #[test]
    fn launcher_failures_surface_as_os_errors() {
        let bindings = capabilities(Arc::new(DisabledLauncher));
        let err = call(&bindings, "interface_ip_addresses", vec![Value::str("eth0")]).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OSError);
        assert!(err.message.contains("No subprocess available"));
    }

    #[test]
    fn granularity_needs_no_procfs() {
        let bindings = capabilities_with(ProcFs::new("/nonexistent"), Arc::new(DisabledLauncher));
        assert_eq!(
            call(&bindings, "uptime_granularity", vec![]).unwrap(),
            Value::Float(UPTIME_GRANULARITY)
        );
    }
}

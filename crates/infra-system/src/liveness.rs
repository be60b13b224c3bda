// Process liveness
// Used after a stop to find probe processes that outlived their session.

/// True while `pid` names a process that has not been reaped yet.
///
/// An exited but unreaped child (a zombie) still counts as alive.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // No signal is sent; EPERM still means the process exists
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(windows)]
pub fn is_alive(pid: u32) -> bool {
    use windows_sys::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
    use windows_sys::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
    };

    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if handle == 0 {
            return false;
        }
        let mut code = 0u32;
        let queried = GetExitCodeProcess(handle, &mut code) != 0;
        CloseHandle(handle);
        queried && code == STILL_ACTIVE as u32
    }
}

/// Pids from `pids` that are still alive
pub fn lingering(pids: impl IntoIterator<Item = u32>) -> Vec<u32> {
    pids.into_iter().filter(|pid| is_alive(*pid)).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[tokio::test]
    async fn test_reaped_child_is_not_alive() {
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "exit 0"])
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        child.wait().await.unwrap();

        assert!(!is_alive(pid));
        assert_eq!(lingering([pid, std::process::id()]), vec![std::process::id()]);
    }
}

//! Command-line front end: map remote drives, run the engine in the
//! foreground, or unload a resident instance.

use std::{env, process};

use log::{LevelFilter, error};

use etherdfs::cli::{self, Args};
use etherdfs::session;

fn main() {
    let argv: Vec<String> = env::args().skip(1).collect();
    let args = match cli::parse(&argv) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("ethdfs: {err}");
            eprint!("{}", cli::USAGE);
            process::exit(1);
        }
    };

    let default_level = if args.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(default_level)
        .init();

    let code = if args.unload { unload(&args) } else { install(&args) };
    process::exit(code);
}

fn unload(args: &Args) -> i32 {
    let dir = session::runtime_dir();
    let pid = match session::read_pidfile(&dir) {
        Ok(pid) => pid,
        Err(err) => {
            error!("no resident engine found: {err}");
            return 1;
        }
    };
    #[cfg(target_os = "linux")]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;
        if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            error!("cannot signal resident engine (pid {pid}): {err}");
            return 1;
        }
    }
    let _ = session::remove_pidfile(&dir);
    if !args.quiet {
        println!("ethdfs: engine unloaded (pid {pid})");
    }
    0
}

#[cfg(target_os = "linux")]
fn install(args: &Args) -> i32 {
    use std::fs;
    use std::sync::Arc;

    use etherdfs::packet::PacketSocket;
    use etherdfs::session::{Config, Session, format_mac};
    use etherdfs::transport::SystemTicks;
    use etherdfs::{Inbox, LinkDriver, mapping};

    let interface =
        env::var("ETHDFS_IFACE").unwrap_or_else(|_| String::from("eth0"));
    let socket = match PacketSocket::open(&interface) {
        Ok(socket) => socket,
        Err(err) => {
            error!("cannot open packet interface {interface}: {err}");
            return 1;
        }
    };
    let inbox = Inbox::new();
    if let Err(err) = socket.clone().spawn_receiver(inbox.clone()) {
        error!("cannot start receiver: {err}");
        return 1;
    }

    let config = Config {
        peer: args.peer,
        mappings: args.mappings.clone(),
        checksum: args.checksum,
    };
    let driver: Arc<dyn LinkDriver> = socket.clone();
    let mut session = match Session::new(
        driver,
        inbox,
        Box::new(SystemTicks::new()),
        socket.local_mac(),
        config,
    ) {
        Ok(session) => session,
        Err(err) => {
            error!("install failed: {err}");
            return 1;
        }
    };

    let dir = session::runtime_dir();
    let pidfile = match session::write_pidfile(&dir) {
        Ok(path) => path,
        Err(err) => {
            error!("cannot write pidfile in {}: {err}", dir.display());
            return 1;
        }
    };

    if !args.quiet {
        let peer = format_mac(session.peer());
        for (local, remote) in session.redirector().drives().iter_mapped() {
            println!(
                "{}: => {}: on {peer}",
                mapping::drive_letter(local),
                mapping::drive_letter(remote)
            );
        }
    }

    wait_for_signal();
    let _ = fs::remove_file(pidfile);
    session.unmount();
    0
}

#[cfg(not(target_os = "linux"))]
fn install(_args: &Args) -> i32 {
    error!("no packet driver shim for this platform");
    1
}

#[cfg(target_os = "linux")]
static STOP: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

#[cfg(target_os = "linux")]
extern "C" fn on_signal(_: libc::c_int) {
    STOP.store(true, std::sync::atomic::Ordering::SeqCst);
}

#[cfg(target_os = "linux")]
fn wait_for_signal() {
    unsafe {
        libc::signal(libc::SIGINT, on_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, on_signal as libc::sighandler_t);
    }
    while !STOP.load(std::sync::atomic::Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }
}

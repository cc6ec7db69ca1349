use sigprims_frame::{HEADER_SIZE, MAGIC, POSTFIX};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("sigprims {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: sigprims");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SIGPRIMS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "frame: prefix={:?} header={}B postfix={:#04x}",
        String::from_utf8_lossy(&MAGIC),
        HEADER_SIZE,
        POSTFIX
    );
    println!("unix_sockets: {}", cfg!(unix));

    Ok(SUCCESS)
}

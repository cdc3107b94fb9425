use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("halflink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: halflink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("HALFLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: remote={}, keyring={}, cli=true",
        cfg!(feature = "remote"),
        cfg!(feature = "keyring")
    );
    println!(
        "serial: {} baud 8N1",
        halflink_transport::DEFAULT_BAUD_RATE
    );

    Ok(SUCCESS)
}

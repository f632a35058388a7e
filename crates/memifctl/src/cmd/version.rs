use memifctl_api::MessageTable;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("memifctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: memifctl");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("MEMIFCTL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "api: memif-api {} (memif ids from {})",
        memifctl_client::HandshakeConfig::default().protocol_version,
        MessageTable::STANDARD_MEMIF_BASE
    );

    Ok(SUCCESS)
}

//! Target triple parsing and detection: `arch[-vendor]-os[-env]`.

use std::path::Path;
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    X86_64,
    I686,
    Aarch64,
    Armv7,
    Riscv32,
    Riscv64,
    Mips,
    Mipsel,
    Powerpc64,
    Powerpc64le,
    S390x,
    Wasm32,
}

impl Arch {
    fn as_str(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::I686 => "i686",
            Arch::Aarch64 => "aarch64",
            Arch::Armv7 => "armv7",
            Arch::Riscv32 => "riscv32",
            Arch::Riscv64 => "riscv64",
            Arch::Mips => "mips",
            Arch::Mipsel => "mipsel",
            Arch::Powerpc64 => "powerpc64",
            Arch::Powerpc64le => "powerpc64le",
            Arch::S390x => "s390x",
            Arch::Wasm32 => "wasm32",
        }
    }

    fn from_str_opt(s: &str) -> Option<Arch> {
        Some(match s {
            "x86_64" | "amd64" => Arch::X86_64,
            "i686" | "i386" | "x86" => Arch::I686,
            "aarch64" | "arm64" => Arch::Aarch64,
            "armv7" | "arm" => Arch::Armv7,
            "riscv32" => Arch::Riscv32,
            "riscv64" => Arch::Riscv64,
            "mips" => Arch::Mips,
            "mipsel" => Arch::Mipsel,
            "powerpc64" | "ppc64" => Arch::Powerpc64,
            "powerpc64le" | "ppc64le" => Arch::Powerpc64le,
            "s390x" => Arch::S390x,
            "wasm32" => Arch::Wasm32,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Os {
    Linux,
    Darwin,
    Freebsd,
    Windows,
    Bare,
}

impl Os {
    fn as_str(self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Freebsd => "freebsd",
            Os::Windows => "windows",
            Os::Bare => "bare",
        }
    }

    /// Strip a trailing numeric/dot version suffix, e.g. `darwin24.3.0` →
    /// `darwin`, then match the canonical name.
    fn from_str_opt(s: &str) -> Option<Os> {
        let base = s.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
        Some(match base {
            "linux" => Os::Linux,
            "darwin" | "macos" | "apple" => Os::Darwin,
            "freebsd" => Os::Freebsd,
            "windows" | "win32" | "pc-windows" => Os::Windows,
            "none" | "bare" => Os::Bare,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Env {
    Gnu,
    Gnueabihf,
    Musl,
    Musleabihf,
    Android,
    Msvc,
    Mingw32,
    Eabi,
    Eabihf,
    Macho,
}

impl Env {
    fn as_str(self) -> &'static str {
        match self {
            Env::Gnu => "gnu",
            Env::Gnueabihf => "gnueabihf",
            Env::Musl => "musl",
            Env::Musleabihf => "musleabihf",
            Env::Android => "android",
            Env::Msvc => "msvc",
            Env::Mingw32 => "mingw32",
            Env::Eabi => "eabi",
            Env::Eabihf => "eabihf",
            Env::Macho => "macho",
        }
    }

    fn from_str_opt(s: &str) -> Option<Env> {
        Some(match s {
            "gnu" => Env::Gnu,
            "gnueabihf" => Env::Gnueabihf,
            "musl" => Env::Musl,
            "musleabihf" => Env::Musleabihf,
            "android" => Env::Android,
            "msvc" => Env::Msvc,
            "mingw32" | "gnu-mingw32" => Env::Mingw32,
            "eabi" => Env::Eabi,
            "eabihf" => Env::Eabihf,
            "macho" => Env::Macho,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `arch[-vendor]-os[-env]` identifier of a compilation target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub arch: Arch,
    pub vendor: Option<String>,
    pub os: Os,
    pub env: Option<Env>,
}

impl Triple {
    /// Parse a triple string, tolerating 2-, 3- and 4-field forms.
    ///
    /// 3-field ambiguity (`arch-X-Y` vs `arch-vendor-os`) is resolved by
    /// probing whether the middle field is a recognized OS.
    pub fn parse(s: &str) -> Result<Triple, Error> {
        let fields: Vec<&str> = s.split('-').collect();
        let err = || Error::Discovery(format!("cannot parse target triple `{s}`"));

        let arch = Arch::from_str_opt(fields.first().ok_or_else(err)?).ok_or_else(err)?;

        match fields.len() {
            1 => Err(err()),
            2 => {
                let os = Os::from_str_opt(fields[1]).ok_or_else(err)?;
                Ok(Triple { arch, vendor: None, os, env: None })
            }
            3 => {
                if let Some(os) = Os::from_str_opt(fields[1]) {
                    // arch-os-env
                    let env = Env::from_str_opt(fields[2]);
                    Ok(Triple { arch, vendor: None, os, env })
                } else {
                    // arch-vendor-os
                    let os = Os::from_str_opt(fields[2]).ok_or_else(err)?;
                    Ok(Triple { arch, vendor: Some(fields[1].to_string()), os, env: None })
                }
            }
            4 => {
                let os = Os::from_str_opt(fields[2]).ok_or_else(err)?;
                let env = Env::from_str_opt(fields[3]);
                Ok(Triple { arch, vendor: Some(fields[1].to_string()), os, env })
            }
            _ => Err(err()),
        }
    }

    /// Detect the target triple by probing a compiler, falling back to the
    /// host if that fails.
    pub fn detect(compiler: Option<&Path>) -> Result<Triple, Error> {
        if let Some(compiler) = compiler {
            if let Some(triple) = Self::probe_compiler(compiler, "--print-effective-triple") {
                return Triple::parse(triple.trim());
            }
            if let Some(triple) = Self::probe_compiler(compiler, "-dumpmachine") {
                return Triple::parse(triple.trim());
            }
        }
        Self::detect_host()
    }

    fn probe_compiler(compiler: &Path, flag: &str) -> Option<String> {
        let output = Command::new(compiler).arg(flag).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            None
        } else {
            Some(stdout)
        }
    }

    /// Synthesize a triple from `uname`, mapping unknown arches to
    /// `x86_64` and unknown OSes to `linux`, with the default env that
    /// matches that OS.
    pub fn detect_host() -> Result<Triple, Error> {
        let uname_m = Command::new("uname")
            .arg("-m")
            .output()
            .map_err(|e| Error::Discovery(format!("failed to run `uname -m`: {e}")))?;
        let uname_s = Command::new("uname")
            .arg("-s")
            .output()
            .map_err(|e| Error::Discovery(format!("failed to run `uname -s`: {e}")))?;

        let arch_str = String::from_utf8_lossy(&uname_m.stdout).trim().to_lowercase();
        let os_str = String::from_utf8_lossy(&uname_s.stdout).trim().to_lowercase();

        let arch = Arch::from_str_opt(&arch_str).unwrap_or(Arch::X86_64);
        let os = match os_str.as_str() {
            "darwin" => Os::Darwin,
            "freebsd" => Os::Freebsd,
            s if s.contains("mingw") || s.contains("windows") => Os::Windows,
            _ => Os::Linux,
        };
        let env = match os {
            Os::Linux => Some(Env::Gnu),
            Os::Darwin => Some(Env::Macho),
            _ => None,
        };
        Ok(Triple { arch, vendor: None, os, env })
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.arch)?;
        if let Some(vendor) = &self.vendor {
            write!(f, "-{vendor}")?;
        }
        write!(f, "-{}", self.os)?;
        if let Some(env) = &self.env {
            write!(f, "-{env}")?;
        }
        Ok(())
    }
}

impl FromStr for Triple {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Triple::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gnu_linux_triple_with_unknown_vendor() {
        let t = Triple::parse("x86_64-unknown-linux-gnu").unwrap();
        assert_eq!(t.arch, Arch::X86_64);
        assert_eq!(t.vendor.as_deref(), Some("unknown"));
        assert_eq!(t.os, Os::Linux);
        assert_eq!(t.env, Some(Env::Gnu));
    }

    #[test]
    fn parses_three_field_arch_os_env() {
        let t = Triple::parse("aarch64-linux-gnu").unwrap();
        assert_eq!(t.arch, Arch::Aarch64);
        assert_eq!(t.vendor, None);
        assert_eq!(t.os, Os::Linux);
        assert_eq!(t.env, Some(Env::Gnu));
    }

    #[test]
    fn parses_darwin_with_os_version_suffix() {
        let t = Triple::parse("aarch64-apple-darwin24.3.0").unwrap();
        assert_eq!(t.arch, Arch::Aarch64);
        assert_eq!(t.vendor.as_deref(), Some("apple"));
        assert_eq!(t.os, Os::Darwin);
        assert_eq!(t.env, None);
    }

    #[test]
    fn two_field_triple() {
        let t = Triple::parse("wasm32-bare").unwrap();
        assert_eq!(t.arch, Arch::Wasm32);
        assert_eq!(t.os, Os::Bare);
        assert_eq!(t.vendor, None);
        assert_eq!(t.env, None);
    }

    #[test]
    fn unrecognized_middle_field_is_a_parse_error() {
        assert!(Triple::parse("wasm32-unknown").is_err());
    }

    #[test]
    fn round_trips_through_display() {
        for s in [
            "x86_64-unknown-linux-gnu",
            "aarch64-linux-gnu",
            "riscv64-linux-musl",
        ] {
            let t = Triple::parse(s).unwrap();
            let reparsed = Triple::parse(&t.to_string()).unwrap();
            assert_eq!(t, reparsed);
        }
    }

    #[test]
    fn rejects_unparseable_triple() {
        assert!(Triple::parse("").is_err());
        assert!(Triple::parse("bogus_arch-linux-gnu").is_err());
    }
}

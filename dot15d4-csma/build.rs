use std::collections::BTreeMap;
use std::env;
use std::fmt::Write;
use std::path::PathBuf;

const PREFIX: &str = "DOT15D4_CSMA_";

fn main() {
    // (Variable, Type, Default value)
    let mut configs: BTreeMap<&str, (&str, &str)> = BTreeMap::from([
        ("MAC_MIN_BE", ("u8", "3")),
        ("MAC_MAX_BE", ("u8", "5")),
        ("MAC_MAX_CSMA_BACKOFFS", ("u8", "4")),
        ("UNIT_BACKOFF_PERIOD", ("u32", "20")),
        ("MAC_BATT_LIFE_EXT", ("bool", "false")),
    ]);

    // Make sure we get rerun if needed
    println!("cargo:rerun-if-changed=build.rs");
    for name in configs.keys() {
        println!("cargo:rerun-if-env-changed={PREFIX}{name}");
    }

    let mut data = String::new();
    writeln!(data, "// Generated by build.rs").unwrap();

    for (var, value) in env::vars() {
        if let Some(name) = var.strip_prefix(PREFIX) {
            // discard from the map as a way of consuming the setting
            let Some((_, (ty, _))) = configs.remove_entry(name) else {
                panic!("Unknown configuration {var}");
            };

            writeln!(data, "pub const {name}: {ty} = {value};").unwrap();
        }
    }

    // Take the remaining configs and write the default value to the file
    for (name, (ty, value)) in configs.iter() {
        writeln!(data, "pub const {name}: {ty} = {value};").unwrap();
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    std::fs::write(out_dir.join("config.rs"), data).unwrap();
}

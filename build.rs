use std::{
    collections::HashMap,
    io::{BufWriter, Write},
};

fn main() {
    generate_configs();
}

fn generate_configs() {
    #[derive(Debug, Clone, Copy)]
    struct ConfigValue {
        value: usize,
        comment: &'static str,
    }

    const CONFIGS: &[(&str, ConfigValue)] = &[
        ("PAGE_SHIFT", ConfigValue {
            value: 13,
            comment: "The size of a page, in bits.",
        }),
        ("NPAGES", ConfigValue {
            value: 129,
            comment: "The number of page-count buckets; spans of up to `NPAGES - 1` pages are \
                      bucketed.",
        }),
    ];

    let mut configs = CONFIGS.iter().copied().collect::<HashMap<_, _>>();

    for (env, value) in std::env::vars() {
        if let Some(name) = env.strip_prefix("CMP_")
            && let Some(slot) = configs.get_mut(name)
            && let Ok(value) = value.parse::<usize>()
        {
            slot.value = value;
        }
    }
    for (name, _) in CONFIGS {
        println!("cargo:rerun-if-env-changed=CMP_{name}");
    }

    let output_dir = std::env::var("OUT_DIR").unwrap();
    let file = std::fs::File::create(format!("{output_dir}/config.rs")).unwrap();
    let mut file = BufWriter::new(file);

    for (name, config) in configs {
        writeln!(
            &mut file,
            "#[doc = \"{}\"] pub const {name}: usize = {};",
            config.comment, config.value
        )
        .unwrap();
    }
}

use inkbridge::{
    config::{CascadePolicyKind, Config},
    engine::EngineKind,
    preprocess::{Binarization, ColorMode},
};

#[test]
fn parse_example_config() {
    let raw = include_str!("../inkbridge.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert!(!cfg.paths.out_dir.is_empty());
    assert_eq!(cfg.cascade.policy, CascadePolicyKind::Sequential);
    assert_eq!(
        cfg.cascade.compare_engines,
        vec![EngineKind::Tesseract, EngineKind::Easyocr]
    );
    assert_eq!(cfg.preprocess.transformer.max_dimension, 384);
    assert_eq!(cfg.preprocess.transformer.output, ColorMode::Rgb);
    assert_eq!(cfg.preprocess.code.binarization, Binarization::Adaptive);
    assert_eq!(cfg.language.scripts[0].start, 0x0900);
    assert_eq!(cfg.translation.num_beams, 5);
}

#[test]
fn example_config_matches_defaults() {
    let raw = include_str!("../inkbridge.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    let defaults = Config::default();
    assert_eq!(cfg.normalized_for_hash(), defaults.normalized_for_hash());
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let cfg: Config = toml::from_str("[cascade]\npolicy = \"compare_all\"\ncompare_engines = [\"tesseract\", \"easyocr\"]\nsentinel = \"none\"\n")
        .expect("parse TOML");
    assert_eq!(cfg.cascade.policy, CascadePolicyKind::CompareAll);
    assert_eq!(cfg.engines.classical.psm, 11);
    assert_eq!(cfg.engines.classical.lang_pack("hi"), "hin");
    assert_eq!(cfg.engines.classical.lang_pack("xx"), "eng");
    assert_eq!(cfg.language.baseline, "en");
}

#[test]
fn load_reads_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("inkbridge.toml");
    std::fs::write(&path, "[translation]\nmodel = \"m\"\nnum_beams = 2\nmax_length = 64\n")
        .expect("write config");
    let cfg = Config::load(&path).expect("load");
    assert_eq!(cfg.translation.num_beams, 2);
    assert!(Config::load(&dir.path().join("missing.toml")).is_err());
}

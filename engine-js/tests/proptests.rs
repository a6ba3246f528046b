use engine_js::format_number;
use engine_js::Runtime;
use engine_js::RuntimeConfig;
use engine_js::Value;
use proptest::prelude::*;

proptest! {
  #[test]
  fn numbers_survive_boxing(n in any::<f64>()) {
    let value = Value::from_number(n);
    prop_assert!(value.is_number());
    prop_assert!(!value.is_pointer());
    let back = value.get_number_unchecked();
    if n.is_nan() {
      prop_assert!(back.is_nan());
    } else {
      prop_assert_eq!(back.to_bits(), n.to_bits());
    }
  }

  #[test]
  fn integral_numbers_format_without_fraction(n in -1_000_000i64..1_000_000) {
    prop_assert_eq!(format_number(n as f64), n.to_string());
  }

  #[test]
  fn collection_keeps_exactly_the_rooted_strings(
    cells in prop::collection::vec(("[a-zé☃]{0,12}", any::<bool>()), 1..48),
  ) {
    let mut rt = Runtime::create(RuntimeConfig::default()).expect("runtime");
    let mut roots = Vec::new();
    {
      let mut scope = rt.scope();
      for (text, keep) in &cells {
        let handle = scope.alloc_string(text).expect("allocate");
        if *keep {
          let value = scope.get(handle);
          roots.push((scope.add_root(value), text.clone()));
        }
      }
    }
    rt.collect_garbage("proptest");
    let live_before = rt.gc_stats().live_cells;
    rt.collect_garbage("proptest");
    prop_assert_eq!(rt.gc_stats().live_cells, live_before);

    for (root, text) in &roots {
      let value = rt.get_root(*root).expect("rooted");
      let view = rt.string_view_of(value).expect("still a string");
      prop_assert_eq!(view.to_string_lossy(), text.clone());
    }
  }
}

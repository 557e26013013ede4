use chrono::NaiveDate;
use insta::assert_snapshot;
use support_router::router::prompt::build_router_instructions;
use support_router::support::{direct_guidance, support_registry};

#[test]
fn test_router_instructions_snapshot() {
    let today = NaiveDate::from_ymd_opt(2024, 10, 2).expect("valid date");
    let registry = support_registry(today, None).expect("valid catalog");
    let instructions = build_router_instructions(&registry.catalog(), &direct_guidance());
    assert_snapshot!(instructions);
}

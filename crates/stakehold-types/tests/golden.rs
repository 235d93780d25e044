use stakehold_types::Address;
use serde_json::json;

#[test]
fn address_serializes_to_golden_json() {
    let addr = Address::new([0xab; 20]);

    assert_eq!(
        serde_json::to_string(&addr).unwrap(),
        r#""0xabababababababababababababababababababab""#
    );
}

#[test]
fn address_deserializes_mixed_case() {
    let addr: Address =
        serde_json::from_value(json!("0xABABABABABABABABABABABABABABABABABABABAB")).unwrap();
    assert_eq!(addr, Address::new([0xab; 20]));
}

#[test]
fn address_deserialize_rejects_garbage() {
    let result: Result<Address, _> = serde_json::from_value(json!("alice"));
    assert!(result.is_err());
}

#[test]
fn zero_sentinel() {
    assert!(Address::ZERO.is_zero());
    assert_eq!(
        Address::ZERO.to_string(),
        "0x0000000000000000000000000000000000000000"
    );
}

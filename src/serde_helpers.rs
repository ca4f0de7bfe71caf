//! Serde adapters for on-chain integer amounts.
//!
//! Base-unit amounts overflow JSON numbers, so they travel as decimal strings.

pub mod biguint_string {
    use num_bigint::BigUint;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        BigUint::parse_bytes(s.trim().as_bytes(), 10)
            .ok_or_else(|| D::Error::custom(format!("invalid integer amount: {}", s)))
    }
}

pub mod opt_biguint_string {
    use num_bigint::BigUint;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_str_radix(10)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigUint>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => BigUint::parse_bytes(s.trim().as_bytes(), 10)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid integer amount: {}", s))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Amounts {
        #[serde(with = "super::biguint_string")]
        wei: BigUint,
        #[serde(with = "super::opt_biguint_string", default)]
        gas: Option<BigUint>,
    }

    #[test]
    fn test_large_amount_survives_json() {
        let a = Amounts {
            wei: BigUint::parse_bytes(b"115792089237316195423570985008687907853269984665640564039457", 10)
                .unwrap(),
            gas: None,
        };
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"115792089237316195423570985008687907853269984665640564039457\""));
        let back: Amounts = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_rejects_non_numeric() {
        let res = serde_json::from_str::<Amounts>(r#"{"wei":"12abc"}"#);
        assert!(res.is_err());
    }
}

/// Contains the functions required for a `fmt::Display` implementation.
///
/// Does not include the `Impl` section since it gets very complicated when it comes to generics.
macro_rules! impl_display {
    () => {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "0x{}", hex::encode(self.serialize()))
        }
    };
}

/// Contains the functions required for a `fmt::Debug` implementation.
macro_rules! impl_debug {
    () => {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "0x{}", hex::encode(self.serialize()))
        }
    };
}

/// Contains the functions required for a `FromStr` implementation.
///
/// Expects a `0x`-prefixed hex string.
macro_rules! impl_from_str {
    () => {
        type Err = $crate::Error;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let hex_str = s
                .strip_prefix("0x")
                .ok_or_else(|| $crate::Error::InvalidHex("must start with 0x".to_string()))?;
            let bytes =
                hex::decode(hex_str).map_err(|e| $crate::Error::InvalidHex(e.to_string()))?;
            Self::deserialize(&bytes)
        }
    };
}

/// Contains the functions required for a `serde::Serialize` implementation.
macro_rules! impl_serde_serialize {
    () => {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::ser::Serializer,
        {
            serializer.serialize_str(&self.to_string())
        }
    };
}

/// Contains the functions required for a `serde::Deserialize` implementation.
macro_rules! impl_serde_deserialize {
    () => {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::de::Deserializer<'de>,
        {
            let string = <String as serde::Deserialize>::deserialize(deserializer)?;
            std::str::FromStr::from_str(&string)
                .map_err(|e| serde::de::Error::custom(format!("{:?}", e)))
        }
    };
}

//! Statically known type identifiers.
//!
//! Every value that crosses the connection as a typed object, argument or generic
//! argument implements [`RemoteType`]. Both ends must agree on the identifiers; there
//! is no runtime discovery of unknown types.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::type_id::TypeIdentifier;

/// Assembly name used for built-in types.
pub const STD_ASSEMBLY: &str = "std";

/// A serializable type with a stable cross-process identifier.
pub trait RemoteType: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn type_identifier() -> TypeIdentifier;
}

macro_rules! std_remote_types {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl RemoteType for $ty {
                fn type_identifier() -> TypeIdentifier {
                    TypeIdentifier::new(STD_ASSEMBLY, $name)
                }
            }
        )*
    };
}

std_remote_types! {
    () => "()",
    bool => "bool",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    f32 => "f32",
    f64 => "f64",
    char => "char",
    String => "String",
    Uuid => "Uuid",
}

impl<T: RemoteType> RemoteType for Vec<T> {
    fn type_identifier() -> TypeIdentifier {
        T::type_identifier().array()
    }
}

impl<T: RemoteType> RemoteType for Option<T> {
    fn type_identifier() -> TypeIdentifier {
        TypeIdentifier::new(STD_ASSEMBLY, "Option").with_generic_arguments([T::type_identifier()])
    }
}

impl<V: RemoteType> RemoteType for HashMap<String, V> {
    fn type_identifier() -> TypeIdentifier {
        map_identifier::<V>()
    }
}

impl<V: RemoteType> RemoteType for BTreeMap<String, V> {
    fn type_identifier() -> TypeIdentifier {
        map_identifier::<V>()
    }
}

fn map_identifier<V: RemoteType>() -> TypeIdentifier {
    TypeIdentifier::new(STD_ASSEMBLY, "Map")
        .with_generic_arguments([String::type_identifier(), V::type_identifier()])
}

/// Implement [`RemoteType`] for an application type.
///
/// The assembly is given explicitly; the full name defaults to the type's module path.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Point { x: i32, y: i32 }
///
/// remote_type!(Point, "demo");                 // "demo my_crate::Point"
/// remote_type!(Point, "demo", "demo.Point");   // "demo demo.Point"
/// ```
#[macro_export]
macro_rules! remote_type {
    ($ty:ty, $assembly:expr) => {
        $crate::remote_type!(
            $ty,
            $assembly,
            concat!(module_path!(), "::", stringify!($ty))
        );
    };
    ($ty:ty, $assembly:expr, $full_name:expr) => {
        impl $crate::RemoteType for $ty {
            fn type_identifier() -> $crate::TypeIdentifier {
                $crate::TypeIdentifier::new($assembly, $full_name)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Sample {
        value: i32,
    }

    crate::remote_type!(Sample, "tests");

    #[derive(Debug, Serialize, Deserialize)]
    struct Renamed;

    crate::remote_type!(Renamed, "tests", "tests.Renamed");

    #[test]
    fn test_builtin_identifiers() {
        assert_eq!(i32::type_identifier().to_string(), "std i32");
        assert_eq!(String::type_identifier().to_string(), "std String");
        assert_eq!(<()>::type_identifier().to_string(), "std ()");
    }

    #[test]
    fn test_compound_identifiers() {
        assert_eq!(
            <Vec<Vec<u8>>>::type_identifier().to_string(),
            "std u8[][]"
        );
        assert_eq!(
            <Option<String>>::type_identifier().to_string(),
            "std Option[std String]"
        );
        assert_eq!(
            <HashMap<String, Vec<i64>>>::type_identifier().to_string(),
            "std Map[std String,std i64[]]"
        );
        assert_eq!(
            <HashMap<String, bool>>::type_identifier(),
            <BTreeMap<String, bool>>::type_identifier()
        );
    }

    #[test]
    fn test_macro_defaults_to_module_path() {
        let id = Sample::type_identifier();
        assert_eq!(id.assembly, "tests");
        assert_eq!(id.full_name, format!("{}::Sample", module_path!()));
        assert_eq!(Renamed::type_identifier().full_name, "tests.Renamed");
    }

    #[test]
    fn test_identifiers_survive_parsing() {
        for id in [
            Sample::type_identifier(),
            <Vec<Option<Sample>>>::type_identifier(),
            <HashMap<String, Vec<Uuid>>>::type_identifier(),
        ] {
            assert_eq!(TypeIdentifier::parse(&id.to_string()).unwrap(), id);
        }
    }
}

//! Per-language knowledge the cache needs: root class names, constructor names, and which root
//! classes exist at all.

use crate::panda_file::{SourceLang, TypeId};

/// What has to be synthesized before a language can be verified
#[derive(Copy, Clone, Debug)]
pub struct VerificationInitApi {
    /// Primitive types which get a class
    pub primitive_roots: &'static [TypeId],

    /// Element descriptors of the arrays which get a class up front
    pub array_elements: &'static [&'static str],

    pub need_object: bool,
    pub need_string: bool,
    pub need_class: bool,
}

pub trait LanguageContext: Send + Sync {
    fn source_lang(&self) -> SourceLang;

    /// Descriptor of the root of the class hierarchy
    fn object_descriptor(&self) -> &'static str;

    fn string_descriptor(&self) -> &'static str;

    fn string_array_descriptor(&self) -> &'static str;

    fn class_descriptor(&self) -> &'static str;

    /// Name of instance (and array) constructors
    fn ctor_name(&self) -> &'static str;

    /// Name of static initializers
    fn cctor_name(&self) -> &'static str;

    fn verification_init_api(&self) -> VerificationInitApi;
}

/// Every primitive array, along with the string array
const PANDA_ARRAYS: &[&str] = &[
    "Z",
    "B",
    "H",
    "S",
    "C",
    "I",
    "U",
    "J",
    "Q",
    "F",
    "D",
    "Lpanda/String;",
];

const ETS_ARRAYS: &[&str] = &["Z", "B", "H", "S", "C", "I", "U", "J", "Q", "F", "D"];

pub struct PandaAssemblyContext;

impl LanguageContext for PandaAssemblyContext {
    fn source_lang(&self) -> SourceLang {
        SourceLang::PandaAssembly
    }

    fn object_descriptor(&self) -> &'static str {
        "Lpanda/Object;"
    }

    fn string_descriptor(&self) -> &'static str {
        "Lpanda/String;"
    }

    fn string_array_descriptor(&self) -> &'static str {
        "[Lpanda/String;"
    }

    fn class_descriptor(&self) -> &'static str {
        "Lpanda/Class;"
    }

    fn ctor_name(&self) -> &'static str {
        ".ctor"
    }

    fn cctor_name(&self) -> &'static str {
        ".cctor"
    }

    fn verification_init_api(&self) -> VerificationInitApi {
        VerificationInitApi {
            primitive_roots: &TypeId::PRIMITIVES,
            array_elements: PANDA_ARRAYS,
            need_object: true,
            need_string: true,
            need_class: true,
        }
    }
}

/// Dynamic language: values are tagged, so only a handful of primitives matter
pub struct EcmascriptContext;

impl LanguageContext for EcmascriptContext {
    fn source_lang(&self) -> SourceLang {
        SourceLang::Ecmascript
    }

    fn object_descriptor(&self) -> &'static str {
        "Lpanda/Object;"
    }

    fn string_descriptor(&self) -> &'static str {
        "Lpanda/String;"
    }

    fn string_array_descriptor(&self) -> &'static str {
        "[Lpanda/String;"
    }

    fn class_descriptor(&self) -> &'static str {
        "Lpanda/Class;"
    }

    fn ctor_name(&self) -> &'static str {
        ".ctor"
    }

    fn cctor_name(&self) -> &'static str {
        ".cctor"
    }

    fn verification_init_api(&self) -> VerificationInitApi {
        VerificationInitApi {
            primitive_roots: &[
                TypeId::Tagged,
                TypeId::Void,
                TypeId::U1,
                TypeId::I32,
                TypeId::F64,
            ],
            array_elements: &[],
            need_object: true,
            need_string: false,
            need_class: false,
        }
    }
}

pub struct EtsContext;

impl LanguageContext for EtsContext {
    fn source_lang(&self) -> SourceLang {
        SourceLang::Ets
    }

    fn object_descriptor(&self) -> &'static str {
        "Lstd/core/Object;"
    }

    fn string_descriptor(&self) -> &'static str {
        "Lstd/core/String;"
    }

    fn string_array_descriptor(&self) -> &'static str {
        "[Lstd/core/String;"
    }

    fn class_descriptor(&self) -> &'static str {
        "Lstd/core/Class;"
    }

    fn ctor_name(&self) -> &'static str {
        "<ctor>"
    }

    fn cctor_name(&self) -> &'static str {
        "<cctor>"
    }

    fn verification_init_api(&self) -> VerificationInitApi {
        VerificationInitApi {
            primitive_roots: &TypeId::PRIMITIVES,
            array_elements: ETS_ARRAYS,
            need_object: true,
            need_string: true,
            need_class: true,
        }
    }
}

pub fn language_context(lang: SourceLang) -> &'static dyn LanguageContext {
    match lang {
        SourceLang::PandaAssembly => &PandaAssemblyContext,
        SourceLang::Ecmascript => &EcmascriptContext,
        SourceLang::Ets => &EtsContext,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn contexts_match_languages() {
        for lang in SourceLang::ALL {
            assert_eq!(language_context(lang).source_lang(), lang);
        }
    }

    #[test]
    fn ecmascript_roots() {
        let api = language_context(SourceLang::Ecmascript).verification_init_api();
        assert!(api.need_object);
        assert!(!api.need_string);
        assert!(api.array_elements.is_empty());
        assert!(api.primitive_roots.contains(&TypeId::Tagged));
        assert!(!api.primitive_roots.contains(&TypeId::I8));
    }
}

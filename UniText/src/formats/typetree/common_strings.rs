//! Unity's built-in type tree string table
//!
//! Blob type trees reference this table instead of their local string
//! buffer when the high bit of an offset is set. Offsets are byte positions
//! into the NUL-separated table below, so the order is significant.

use std::sync::LazyLock;

/// Bit marking an offset into the common table
pub const COMMON_STRING_FLAG: u32 = 0x8000_0000;

const COMMON_STRINGS: &[&str] = &[
    "AABB",
    "AnimationClip",
    "AnimationCurve",
    "AnimationState",
    "Array",
    "Base",
    "BitField",
    "bitset",
    "bool",
    "char",
    "ColorRGBA",
    "Component",
    "data",
    "deque",
    "double",
    "dynamic_array",
    "FastPropertyName",
    "first",
    "float",
    "Font",
    "GameObject",
    "Generic Mono",
    "GradientNEW",
    "GUID",
    "GUIStyle",
    "int",
    "list",
    "long long",
    "map",
    "Matrix4x4f",
    "MdFour",
    "MonoBehaviour",
    "MonoScript",
    "m_ByteSize",
    "m_Curve",
    "m_EditorClassIdentifier",
    "m_EditorHideFlags",
    "m_Enabled",
    "m_ExtensionPtr",
    "m_GameObject",
    "m_Index",
    "m_IsArray",
    "m_IsStatic",
    "m_MetaFlag",
    "m_Name",
    "m_ObjectHideFlags",
    "m_PrefabInternal",
    "m_PrefabParentObject",
    "m_Script",
    "m_StaticEditorFlags",
    "m_Type",
    "m_Version",
    "Object",
    "pair",
    "PPtr<Component>",
    "PPtr<GameObject>",
    "PPtr<Material>",
    "PPtr<MonoBehaviour>",
    "PPtr<MonoScript>",
    "PPtr<Object>",
    "PPtr<Prefab>",
    "PPtr<Sprite>",
    "PPtr<TextAsset>",
    "PPtr<Texture>",
    "PPtr<Texture2D>",
    "PPtr<Transform>",
    "Prefab",
    "Quaternionf",
    "Rectf",
    "RectInt",
    "RectOffset",
    "second",
    "set",
    "short",
    "size",
    "SInt16",
    "SInt32",
    "SInt64",
    "SInt8",
    "staticvector",
    "string",
    "TextAsset",
    "TextMesh",
    "Texture",
    "Texture2D",
    "Transform",
    "TypelessData",
    "UInt16",
    "UInt32",
    "UInt64",
    "UInt8",
    "unsigned int",
    "unsigned long long",
    "unsigned short",
    "vector",
    "Vector2f",
    "Vector3f",
    "Vector4f",
    "m_ScriptingClassIdentifier",
    "Gradient",
    "Type*",
    "int2_storage",
    "int3_storage",
    "BoundsInt",
    "m_CorrespondingSourceObject",
    "m_PrefabInstance",
    "m_PrefabAsset",
    "FileSize",
    "Hash128",
];

/// (offset, string) pairs in table order
static OFFSETS: LazyLock<Vec<(u32, &'static str)>> = LazyLock::new(|| {
    let mut offset = 0u32;
    COMMON_STRINGS
        .iter()
        .map(|s| {
            let entry = (offset, *s);
            offset += s.len() as u32 + 1;
            entry
        })
        .collect()
});

/// Resolve an offset (without the flag bit) into the common table
#[must_use]
pub fn lookup(offset: u32) -> Option<&'static str> {
    OFFSETS
        .binary_search_by_key(&offset, |(o, _)| *o)
        .ok()
        .map(|i| OFFSETS[i].1)
}

/// Offset of a common string, used when writing compact type trees
#[must_use]
pub fn offset_of(name: &str) -> Option<u32> {
    OFFSETS.iter().find(|(_, s)| *s == name).map(|(o, _)| *o)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_offsets() {
        assert_eq!(lookup(0), Some("AABB"));
        assert_eq!(lookup(5), Some("AnimationClip"));
        assert_eq!(offset_of("Array"), Some(49));
        assert_eq!(lookup(3), None);
    }

    #[test]
    fn test_roundtrip_every_entry() {
        for name in COMMON_STRINGS {
            let offset = offset_of(name).unwrap();
            assert_eq!(lookup(offset), Some(*name));
        }
    }
}

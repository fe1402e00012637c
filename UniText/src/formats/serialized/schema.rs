//! Class ids and the built-in schemas used when a file has no type trees

use crate::formats::typetree::{build, TypeTree, TypeTreeNode};

pub const CLASS_GAME_OBJECT: i32 = 1;
pub const CLASS_TRANSFORM: i32 = 4;
pub const CLASS_TEXT_ASSET: i32 = 49;
pub const CLASS_MONO_BEHAVIOUR: i32 = 114;
pub const CLASS_MONO_SCRIPT: i32 = 115;
pub const CLASS_RECT_TRANSFORM: i32 = 224;

/// Field holding the undecoded remainder of a MonoBehaviour read through
/// the built-in schema
pub const RAW_DATA_FIELD: &str = "m_RawData";

/// Names of the classes the tool dispatches on or commonly reports
#[must_use]
pub fn class_name(class_id: i32) -> Option<&'static str> {
    Some(match class_id {
        CLASS_GAME_OBJECT => "GameObject",
        CLASS_TRANSFORM => "Transform",
        21 => "Material",
        28 => "Texture2D",
        43 => "Mesh",
        48 => "Shader",
        CLASS_TEXT_ASSET => "TextAsset",
        74 => "AnimationClip",
        83 => "AudioClip",
        CLASS_MONO_BEHAVIOUR => "MonoBehaviour",
        CLASS_MONO_SCRIPT => "MonoScript",
        128 => "Font",
        142 => "AssetBundle",
        213 => "Sprite",
        CLASS_RECT_TRANSFORM => "RectTransform",
        _ => return None,
    })
}

/// Major component of a Unity version string such as `2021.3.4f1`
#[must_use]
pub fn unity_major(unity_version: &str) -> Option<u32> {
    unity_version.split('.').next()?.trim().parse().ok()
}

/// Built-in tree for `class_id`, if one exists
#[must_use]
pub fn builtin_tree(class_id: i32, unity_version: &str, file_version: u32) -> Option<TypeTree> {
    match class_id {
        CLASS_TEXT_ASSET => Some(text_asset_tree(unity_version)),
        CLASS_MONO_BEHAVIOUR => Some(mono_behaviour_tree(file_version)),
        _ => None,
    }
}

/// `TextAsset`: name and script, plus the path name before Unity 5
#[must_use]
pub fn text_asset_tree(unity_version: &str) -> TypeTree {
    let mut tree = TypeTree::new(vec![TypeTreeNode::new(0, "TextAsset", "Base", -1)])
        .with(build::string(1, "m_Name"))
        .with(build::string(1, "m_Script"));
    if unity_major(unity_version).is_some_and(|major| major < 5) {
        tree = tree.with(build::string(1, "m_PathName"));
    }
    tree
}

/// The engine-defined head of every `MonoBehaviour`
///
/// Script-defined fields follow these and cannot be named without the
/// script's type tree.
#[must_use]
pub fn mono_behaviour_tree(file_version: u32) -> TypeTree {
    let wide = file_version >= 14;
    TypeTree::new(vec![TypeTreeNode::new(0, "MonoBehaviour", "Base", -1)])
        .with(build::pptr(1, "GameObject", "m_GameObject", wide))
        .with([TypeTreeNode::new(1, "UInt8", "m_Enabled", 1).aligned()])
        .with(build::pptr(1, "MonoScript", "m_Script", wide))
        .with(build::string(1, "m_Name"))
}

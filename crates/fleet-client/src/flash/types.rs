//! Flash layout types

use std::path::{Path, PathBuf};

use crate::types::FirmwareArtifact;

/// Flash address of the provisioning NVS partition
pub const PROVISIONING_OFFSET: u32 = 0x610000;

/// What an image written to flash holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Firmware(FirmwareArtifact),
    Provisioning,
}

/// One image and the address it is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashImage {
    pub offset: u32,
    pub path: PathBuf,
    pub kind: ImageKind,
}

impl FlashImage {
    /// Offset as passed to the flashing tool, e.g. `0x10000`
    pub fn offset_arg(&self) -> String {
        format!("{:#x}", self.offset)
    }
}

/// Ordered set of images written in one flashing tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashLayout {
    images: Vec<FlashImage>,
}

impl FlashLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full device layout: every firmware artifact at its fixed offset,
    /// then the provisioning image
    pub fn full<F>(artifact_path: F, provisioning: &Path) -> Self
    where
        F: Fn(FirmwareArtifact) -> PathBuf,
    {
        let mut layout = Self::new();
        for artifact in FirmwareArtifact::ALL {
            layout = layout.with(
                artifact.flash_offset(),
                artifact_path(artifact),
                ImageKind::Firmware(artifact),
            );
        }
        layout.with(
            PROVISIONING_OFFSET,
            provisioning.to_path_buf(),
            ImageKind::Provisioning,
        )
    }

    /// Only the provisioning image
    pub fn provisioning_only(provisioning: &Path) -> Self {
        Self::new().with(
            PROVISIONING_OFFSET,
            provisioning.to_path_buf(),
            ImageKind::Provisioning,
        )
    }

    /// Append an image
    pub fn with(mut self, offset: u32, path: PathBuf, kind: ImageKind) -> Self {
        self.images.push(FlashImage { offset, path, kind });
        self
    }

    pub fn images(&self) -> &[FlashImage] {
        &self.images
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// `offset path` pairs in write order
    pub fn to_args(&self) -> Vec<String> {
        self.images
            .iter()
            .flat_map(|image| [image.offset_arg(), image.path.display().to_string()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_layout_order() {
        let layout = FlashLayout::full(
            |a| PathBuf::from(format!("/run/{}", a.file_name())),
            Path::new("/run/provisioning.bin"),
        );
        assert_eq!(
            layout.to_args(),
            [
                "0x1000",
                "/run/bootloader.bin",
                "0x8000",
                "/run/partitions.bin",
                "0xe000",
                "/run/boot_app0.bin",
                "0x10000",
                "/run/firmware.bin",
                "0x610000",
                "/run/provisioning.bin",
            ]
        );
    }

    #[test]
    fn test_provisioning_only() {
        let layout = FlashLayout::provisioning_only(Path::new("p.bin"));
        assert_eq!(layout.images().len(), 1);
        assert_eq!(layout.images()[0].kind, ImageKind::Provisioning);
        assert_eq!(layout.to_args(), ["0x610000", "p.bin"]);
    }
}

// Synchronization primitives
//
// Two semaphores shared by every frame. No fences: the renderer keeps at
// most one frame in flight and orders everything on the GPU side.

use super::driver::{Driver, GpuObject};
use crate::context::Ledger;
use crate::error::{check, ObjectKind, Op, Result};
use ash::vk;

#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    /// Signaled by acquire, waited on by submit
    pub image_available: vk::Semaphore,
    /// Signaled by submit, waited on by present
    pub rendering_finished: vk::Semaphore,
}

impl FrameSync {
    pub fn new<D: Driver>(driver: &mut D, ledger: &mut Ledger) -> Result<Self> {
        let image_available = Self::semaphore(driver, ledger)?;
        let rendering_finished = Self::semaphore(driver, ledger)?;

        Ok(Self {
            image_available,
            rendering_finished,
        })
    }

    fn semaphore<D: Driver>(driver: &mut D, ledger: &mut Ledger) -> Result<vk::Semaphore> {
        let semaphore = check(driver.create_semaphore(), Op::Create(ObjectKind::Semaphore))?;
        ledger.record(GpuObject::Semaphore(semaphore));
        Ok(semaphore)
    }
}

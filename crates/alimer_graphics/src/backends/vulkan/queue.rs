//! Queue family resolution and queue allocation
//!
//! Three logical roles are mapped onto whatever families the adapter exposes. Compute and copy
//! prefer dedicated families and otherwise share the graphics family on later queue indices:
//!
//! ```text
//! families: [G|C|T x16] [C|T x8] [T x2]   -> graphics 0/0, compute 1/0, copy 2/0
//! families: [G|C|T x16]                   -> graphics 0/0, compute 0/1, copy 0/2
//! families: [G|C|T x1]                    -> everything on 0/0
//! ```

use ash::vk;

/// Queue family of each role; `None` when no suitable family exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family with graphics, compute and present support
    pub graphics: Option<u32>,
    /// First other family with compute support
    pub compute: Option<u32>,
    /// Preferably a transfer-only family
    pub copy: Option<u32>,
}

impl QueueFamilyIndices {
    /// Whether the adapter can be used at all
    pub fn has_graphics(&self) -> bool {
        self.graphics.is_some()
    }
}

/// Assign queue families to the graphics, compute and copy roles
///
/// `present_support` is queried per family index; pass `|_| true` when running headless.
pub fn resolve_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: impl Fn(u32) -> bool,
) -> QueueFamilyIndices {
    let required_graphics = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE;
    let indexed = || (0u32..).zip(families.iter());

    let graphics = indexed()
        .find(|(i, family)| family.queue_flags.contains(required_graphics) && present_support(*i))
        .map(|(i, _)| i);

    let compute = indexed()
        .find(|(i, family)| Some(*i) != graphics && family.queue_flags.contains(vk::QueueFlags::COMPUTE))
        .map(|(i, _)| i);

    let copy = indexed()
        .find(|(i, family)| {
            Some(*i) != graphics && Some(*i) != compute && family.queue_flags.contains(vk::QueueFlags::TRANSFER)
        })
        .or_else(|| {
            indexed().find(|(i, family)| {
                Some(*i) != graphics && family.queue_flags.contains(vk::QueueFlags::TRANSFER)
            })
        })
        .map(|(i, _)| i);

    QueueFamilyIndices {
        graphics,
        compute,
        copy,
    }
}

/// One `VkDeviceQueueCreateInfo` worth of queues
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueRequest {
    /// Queue family index
    pub family: u32,
    /// Number of queues
    pub count: u32,
    /// Priority shared by every queue in the request
    pub priority: f32,
}

/// Final queue layout for device creation
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePlan {
    /// Graphics family; its queue index is always 0
    pub graphics_family: u32,
    /// Compute family
    pub compute_family: u32,
    /// Compute queue index within its family
    pub compute_index: u32,
    /// Copy family
    pub copy_family: u32,
    /// Copy queue index within its family
    pub copy_index: u32,
    /// Create infos to pass to the device
    pub requests: Vec<QueueRequest>,
}

/// Decide how many queues to create per family and which index each role uses
///
/// Returns `None` when there is no graphics family.
pub fn plan_queue_allocation(
    families: &[vk::QueueFamilyProperties],
    indices: &QueueFamilyIndices,
) -> Option<QueuePlan> {
    let graphics_family = indices.graphics?;
    let queue_count = |family: u32| {
        families
            .get(family as usize)
            .map_or(1, |properties| properties.queue_count.max(1))
    };
    let graphics_count = queue_count(graphics_family);

    let mut universal_index = 1u32;
    let mut compute_index = 0u32;
    let mut copy_index = 0u32;

    let compute_family = match indices.compute {
        Some(family) => family,
        None => {
            compute_index = (graphics_count - 1).min(universal_index);
            universal_index += 1;
            graphics_family
        }
    };

    let copy_family = match indices.copy {
        None => {
            copy_index = (graphics_count - 1).min(universal_index);
            universal_index += 1;
            graphics_family
        }
        Some(family) if family == compute_family => {
            copy_index = (queue_count(compute_family) - 1).min(1);
            family
        }
        Some(family) => family,
    };

    let mut requests = vec![QueueRequest {
        family: graphics_family,
        count: universal_index.min(graphics_count),
        priority: 0.5,
    }];

    if compute_family != graphics_family {
        let wanted = if copy_family == compute_family { 2 } else { 1 };
        requests.push(QueueRequest {
            family: compute_family,
            count: wanted.min(queue_count(compute_family)),
            priority: 1.0,
        });
    }

    if copy_family != graphics_family && copy_family != compute_family {
        requests.push(QueueRequest {
            family: copy_family,
            count: 1,
            priority: 1.0,
        });
    }

    Some(QueuePlan {
        graphics_family,
        compute_family,
        compute_index,
        copy_family,
        copy_index,
        requests,
    })
}

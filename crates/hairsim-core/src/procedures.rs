//! 整形项目目录
//!
//! 除植发外的项目只需要一段固定的生成指令，没有额外的计算逻辑。

use serde::Serialize;

/// 植发项目ID，走分级 + 时间线专用流程
pub const HAIR_TRANSPLANT_ID: &str = "hair-transplant";

/// 整形项目
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Procedure {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub prompt: &'static str,
}

impl Procedure {
    pub fn is_hair_transplant(&self) -> bool {
        self.id == HAIR_TRANSPLANT_ID
    }
}

pub static PROCEDURES: &[Procedure] = &[
    Procedure {
        id: "mole-removal",
        name: "Mole Removal",
        description: "Skin lesion removal",
        prompt: "In the location of the prominent mole on the cheek, replace it with clear, \
            smooth skin and a tiny, faded, flat white scar that is barely visible. The skin \
            texture must be perfectly blended. The rest of the face and background must remain \
            identical.",
    },
    Procedure {
        id: "rhinoplasty",
        name: "Rhinoplasty",
        description: "Nose reshaping",
        prompt: "Subtly reshape the nose in the provided photo to have a straighter bridge and a \
            more refined, slightly lifted tip. Ensure the result is natural-looking and \
            harmonious with the other facial features. The skin texture and lighting must remain \
            consistent with the original image. Only modify the nose.",
    },
    Procedure {
        id: "tummy-tuck",
        name: "Tummy Tuck",
        description: "Abdominoplasty",
        prompt: "On the abdomen in the provided image, add a thin, well-healed horizontal scar \
            from hip to hip, located low enough to be hidden by underwear. Subtly reshape the \
            navel to appear more vertically oriented and neat. The abdominal skin should appear \
            tighter and flatter. Ensure all other parts of the image remain identical.",
    },
    Procedure {
        id: "blepharoplasty",
        name: "Blepharoplasty",
        description: "Eyelid surgery",
        prompt: "For the eyes in the provided image, remove the excess skin on the upper eyelids \
            and reduce the puffy bags under the eyes to create a smoother, more rested \
            appearance. Add incredibly fine, almost invisible scars hidden within the natural \
            crease of the upper eyelids. Do not change the eye shape or any other part of the \
            face.",
    },
    Procedure {
        id: "lip-filler",
        name: "Lip Filler",
        description: "Lip enhancement",
        prompt: "In the provided photo, perform a lip filler simulation. Make both the upper and \
            lower lips noticeably thicker and fuller, creating a plump, well-defined look. The \
            result must appear natural and keep the original lip texture and color. The rest of \
            the face and background must remain completely unchanged.",
    },
    Procedure {
        id: HAIR_TRANSPLANT_ID,
        name: "Hair Transplant",
        description: "Hair restoration",
        prompt: "Simulate a hair transplant with full, transformative results. Cover the frontal \
            hairline and crown with thick, dense hair so that no bald spots remain, replacing any \
            receding hairline with a strong, natural hairline. The new hair's color and texture \
            must blend flawlessly with any existing hair. Do not change any other part of the \
            image.",
    },
    Procedure {
        id: "cleft-lip-repair",
        name: "Cleft Lip Repair",
        description: "Corrective surgery",
        prompt: "In the provided photo, repair the unilateral cleft lip. Close the gap in the \
            upper lip, create a symmetrical and natural-looking Cupid's bow, and align the base \
            of the nose. Add a very thin, faded vertical scar from the nostril down through the \
            lip that reads as a natural philtral column. Ensure the rest of the face remains \
            completely unchanged.",
    },
    Procedure {
        id: "brow-lift",
        name: "Brow Lift",
        description: "Forehead lift",
        prompt: "Elevate the position of the eyebrows in the image to create a visibly more \
            alert, open, and youthful appearance. The lift should be noticeable but still look \
            natural. Smooth the deep horizontal wrinkles on the forehead and reduce frown lines \
            between the brows. Add very fine, well-hidden incision scars just within the frontal \
            hairline. Do not change the eye shape or any other facial features.",
    },
    Procedure {
        id: "face-contouring",
        name: "Face Contouring",
        description: "V-Line reshaping",
        prompt: "Subtly contour the facial structure in the provided photo to create a more \
            defined jawline and a slimmer, V-shaped lower face. Reduce buccal fat for a less \
            rounded cheek appearance. The result should look natural and harmonious, without \
            altering skin texture or other identifiable characteristics.",
    },
    Procedure {
        id: "liposuction",
        name: "Liposuction",
        description: "Fat removal",
        prompt: "In the provided image, perform liposuction on the abdomen and flanks. Reduce the \
            localized fat deposits to create a smoother, flatter, and more defined midsection \
            that still looks like a natural body shape. Add a few tiny, circular, faded scars in \
            discreet locations such as the navel, typical for cannula insertion points. The rest \
            of the body must not be changed.",
    },
    Procedure {
        id: "chemical-peel",
        name: "Chemical Peel",
        description: "Skin resurfacing",
        prompt: "Simulate the effect of a medium-depth chemical peel on the face in the photo. \
            Reduce the appearance of fine lines, minor acne scars, and uneven pigmentation so the \
            skin appears smoother and more radiant. The new skin surface must keep a realistic \
            texture with visible pores and must not look airbrushed. Avoid changing any facial \
            features or structure.",
    },
    Procedure {
        id: "botox",
        name: "Botox",
        description: "Wrinkle reduction",
        prompt: "In the provided image, simulate the effects of Botox injections. Smooth out the \
            dynamic wrinkles on the forehead, between the eyebrows, and at the corners of the \
            eyes while maintaining a natural expression. The original skin color, complexion, \
            texture, freckles and pigmentation must be preserved perfectly. Do not freeze the \
            face or alter other features.",
    },
    Procedure {
        id: "chin-surgery",
        name: "Chin Surgery",
        description: "Genioplasty",
        prompt: "Perform a subtle chin augmentation in the provided photo. Project the chin \
            slightly forward to create a more balanced and defined lower facial profile, blending \
            the new contour seamlessly with the jawline. The rest of the face, including the lips \
            and neck, must remain unchanged.",
    },
];

/// 按ID查找项目
pub fn find_procedure(id: &str) -> Option<&'static Procedure> {
    PROCEDURES.iter().find(|p| p.id == id)
}
